//! `GET /api/live`
//!
//! Server-sent events for one symbol. The stream opens with a `snapshot`
//! event carrying the seed series. What follows depends on where the seed
//! came from:
//!
//! - provider data: the chain is polled again every `poll_interval_ms`, and a
//!   fresh `snapshot` goes out whenever the newest bar changes;
//! - simulated data: a live session evolves the last bar and each tick goes
//!   out as an `update` or `bar` event.
//!
//! Everything lives inside the stream, so a client disconnect stops it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, stream};
use tape::synth::{LiveSession, LiveState, SyntheticGenerator, SystemClock};
use tape::{Bar, FallbackChain, QueryResult, SIMULATED_LABEL, Symbol};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::{AppState, SymbolQuery, simulated_history};

/// Build the live routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/live", get(live_handler))
}

async fn live_handler(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Response {
    let symbol = match query.require() {
        Ok(symbol) => symbol,
        Err(rejection) => return rejection,
    };

    let Some(seed) = seed_series(&state, &symbol).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Could not seed series").into_response();
    };
    let Some((bar, volume)) = seed.series.last() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Could not seed series").into_response();
    };

    let snapshot = Event::default().event("snapshot").json_data(&seed);
    let followups: BoxStream<'static, Result<Event, axum::Error>> =
        if seed.source == SIMULATED_LABEL {
            info!(symbol = %symbol, bars = seed.series.len(), "Starting live session");
            let session = LiveSession::spawn(
                LiveState::new(bar, volume),
                SyntheticGenerator::new(),
                Arc::new(SystemClock),
                state.config.tick_interval(),
            );
            session
                .into_events()
                .map(|event| Event::default().event(event.kind()).json_data(event.state()))
                .boxed()
        } else {
            info!(symbol = %symbol, source = %seed.source, "Polling provider data");
            refreshes(state.chain.clone(), symbol, bar, state.config.poll_interval())
                .map(|result| Event::default().event("snapshot").json_data(result))
                .boxed()
        };

    Sse::new(encoded(stream::iter([snapshot]).chain(followups)))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Chain result, or simulated history when the chain had nothing.
async fn seed_series(state: &AppState, symbol: &Symbol) -> Option<QueryResult> {
    let result = state.chain.query(symbol).await;
    if !result.is_empty() {
        return Some(result);
    }

    match simulated_history(state.config.history_len) {
        Ok(series) => Some(QueryResult::new(series, SIMULATED_LABEL)),
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "Simulation failed");
            None
        }
    }
}

/// Re-queries the chain every `period` and yields results whose newest bar
/// differs from the last one sent. Empty results are skipped.
fn refreshes(
    chain: Arc<FallbackChain>,
    symbol: Symbol,
    newest: Bar,
    period: Duration,
) -> impl Stream<Item = QueryResult> + Send + 'static {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold(
        (chain, symbol, newest, ticker),
        |(chain, symbol, mut newest, mut ticker)| async move {
            loop {
                ticker.tick().await;
                let result = chain.query(&symbol).await;
                match result.series.last() {
                    Some((bar, _)) if bar != newest => {
                        newest = bar;
                        return Some((result, (chain, symbol, newest, ticker)));
                    }
                    _ => debug!(symbol = %symbol, "No new provider bars"),
                }
            }
        },
    )
}

/// Drops events that fail to encode.
fn encoded<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>> + Send
where
    S: Stream<Item = Result<Event, axum::Error>> + Send,
{
    events.filter_map(|event| async move {
        match event {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Dropping unencodable live event");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::routes::testing::{bars, state_with};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use std::sync::atomic::{AtomicI64, Ordering};
    use tape::{DataProvider, Series, SeriesProvider};
    use tower::ServiceExt;

    /// Reads body chunks until `want` SSE events have arrived.
    async fn read_events(body: Body, want: usize) -> String {
        let mut stream = body.into_data_stream();
        let mut text = String::new();
        while text.matches("\n\n").count() < want {
            let Some(chunk) = stream.next().await else {
                break;
            };
            text.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
        }
        text
    }

    /// Reads whatever the body sends within `window`.
    async fn read_for(body: Body, window: Duration) -> String {
        let mut stream = body.into_data_stream();
        let mut text = String::new();
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => break,
                chunk = stream.next() => match chunk {
                    Some(chunk) => text.push_str(&String::from_utf8_lossy(&chunk.unwrap())),
                    None => break,
                },
            }
        }
        text
    }

    fn live_config() -> ServerConfig {
        ServerConfig {
            tick_interval_ms: 5,
            poll_interval_ms: 5,
            history_len: 10,
            ..Default::default()
        }
    }

    async fn open(state: AppState, symbol: &str) -> Response {
        routes()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/live?symbol={symbol}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Adds one bar per call.
    #[derive(Debug, Default)]
    struct GrowingProvider {
        calls: AtomicI64,
    }

    impl DataProvider for GrowingProvider {
        fn name(&self) -> &str {
            "Growing"
        }

        fn display_name(&self) -> &str {
            "Growing Feed"
        }

        fn description(&self) -> &str {
            "one more bar per call"
        }
    }

    #[async_trait]
    impl SeriesProvider for GrowingProvider {
        async fn fetch(&self, _symbol: &Symbol) -> Series {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let times: Vec<i64> = (1..=n).map(|i| i * 60).collect();
            bars(&times)
        }
    }

    #[tokio::test]
    async fn test_missing_symbol_is_400() {
        let (state, _) = state_with(Series::new(), live_config());
        let response = routes()
            .with_state(state)
            .oneshot(Request::builder().uri("/api/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_provider_seed_gets_no_synthetic_ticks() {
        let (state, provider) = state_with(bars(&[60, 120]), live_config());
        let response = open(state, "BTCUSD").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "text/event-stream"
        );

        let text = read_for(response.into_body(), Duration::from_millis(150)).await;
        let events: Vec<&str> = text.split("\n\n").filter(|e| !e.trim().is_empty()).collect();

        assert_eq!(events.len(), 1, "{text}");
        assert!(events[0].contains("event: snapshot"));
        assert!(events[0].contains("\"source\":\"Fixed Feed\""));
        assert!(!text.contains("event: bar"));
        assert!(!text.contains("event: update"));
        assert!(provider.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_provider_seed_resends_snapshot_on_new_bar() {
        let chain = FallbackChain::new().with_provider(Arc::new(GrowingProvider::default()));
        let state = AppState::new(Arc::new(live_config()), chain);
        let response = open(state, "AAPL").await;

        let text = read_events(response.into_body(), 2).await;
        let events: Vec<&str> = text.split("\n\n").filter(|e| !e.trim().is_empty()).collect();

        assert_eq!(events.len(), 2, "{text}");
        assert!(events[0].contains("event: snapshot"));
        assert!(!events[0].contains("\"time\":120"));
        assert!(events[1].contains("event: snapshot"));
        assert!(events[1].contains("\"time\":120"));
        assert!(events[1].contains("\"source\":\"Growing Feed\""));
    }

    #[tokio::test]
    async fn test_empty_chain_streams_simulation() {
        let (state, _) = state_with(Series::new(), live_config());
        let response = open(state, "NOPE").await;

        let text = read_events(response.into_body(), 2).await;
        let mut events = text.split("\n\n").filter(|e| !e.trim().is_empty());

        let snapshot = events.next().unwrap();
        assert!(snapshot.contains("event: snapshot"));
        assert!(snapshot.contains(SIMULATED_LABEL));

        let tick = events.next().unwrap();
        assert!(tick.contains("event: update") || tick.contains("event: bar"));
        assert!(tick.contains("\"bar\""));
    }
}
