//! Route modules for the gateway
//!
//! - market_data: one-shot series queries
//! - live: simulated live bars over server-sent events
//! - health: liveness endpoint

pub mod health;
pub mod live;
pub mod market_data;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tape::synth::SyntheticGenerator;
use tape::{FallbackChain, Series, Symbol};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// Plain-text body of the only caller-visible error.
pub const MISSING_SYMBOL: &str = "Missing symbol";

/// Application state shared across all handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Provider chain answering symbol queries
    pub chain: Arc<FallbackChain>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Arc<ServerConfig>, chain: FallbackChain) -> Self {
        Self {
            config,
            chain: Arc::new(chain),
        }
    }
}

/// `?symbol=` query string.
#[derive(Debug, Default, Deserialize)]
pub struct SymbolQuery {
    /// Requested ticker.
    pub symbol: Option<String>,
}

impl SymbolQuery {
    /// The trimmed symbol, or the 400 response when it is missing or blank.
    #[allow(clippy::result_large_err)]
    pub fn require(self) -> Result<Symbol, Response> {
        self.symbol
            .map(Symbol::new)
            .filter(|symbol| !symbol.is_empty())
            .ok_or_else(|| (StatusCode::BAD_REQUEST, MISSING_SYMBOL).into_response())
    }
}

/// A random-walk history of `len` bars ending before the current minute.
pub fn simulated_history(len: usize) -> tape::Result<Series> {
    let mut generator = SyntheticGenerator::new();
    let start_price = generator.random_start_price();
    generator.seed_history(len, start_price)
}

/// Build the main application router by merging all route modules
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(market_data::routes())
        .merge(live::routes());

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tape::{Bar, DataProvider, SeriesProvider, VolumeBar};

    /// Provider returning the same series on every call.
    #[derive(Debug)]
    pub(crate) struct FixedProvider {
        pub(crate) series: Series,
        pub(crate) calls: AtomicUsize,
    }

    impl DataProvider for FixedProvider {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn display_name(&self) -> &str {
            "Fixed Feed"
        }

        fn description(&self) -> &str {
            "fixed test series"
        }
    }

    #[async_trait]
    impl SeriesProvider for FixedProvider {
        async fn fetch(&self, _symbol: &Symbol) -> Series {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.series.clone()
        }
    }

    pub(crate) fn bars(times: &[i64]) -> Series {
        let mut series = Series::new();
        for &time in times {
            let bar = Bar::new(time, 10.0, 11.0, 9.0, 10.5);
            series.push(bar, VolumeBar::for_bar(&bar, 100.0)).unwrap();
        }
        series
    }

    pub(crate) fn state_with(
        series: Series,
        config: ServerConfig,
    ) -> (AppState, Arc<FixedProvider>) {
        let provider = Arc::new(FixedProvider {
            series,
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new().with_provider(provider.clone());
        (AppState::new(Arc::new(config), chain), provider)
    }
}
