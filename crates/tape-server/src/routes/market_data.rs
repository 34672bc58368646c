//! `GET /api/market-data`
//!
//! Runs the provider chain for one symbol. Provider failures never become
//! HTTP errors: an exhausted chain answers `null`, or a simulated series when
//! synthetic fallback is enabled.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use tape::{QueryResult, SIMULATED_LABEL};
use tracing::{info, warn};

use super::{AppState, SymbolQuery, simulated_history};

/// Build the market data routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/market-data", get(market_data_handler))
}

async fn market_data_handler(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Response {
    let symbol = match query.require() {
        Ok(symbol) => symbol,
        Err(rejection) => return rejection,
    };

    let result = state.chain.query(&symbol).await;
    if !result.is_empty() {
        return Json(result).into_response();
    }

    if state.config.synthetic_fallback {
        match simulated_history(state.config.history_len) {
            Ok(series) => {
                info!(symbol = %symbol, bars = series.len(), "Serving simulated series");
                return Json(QueryResult::new(series, SIMULATED_LABEL)).into_response();
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "Simulation failed"),
        }
    }

    Json(Option::<QueryResult>::None).into_response()
}
