#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Finnhub candle provider.
//!
//! Requests the last 24 hours of one-minute candles. The response is a
//! struct of parallel arrays guarded by a status field.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tape_core::{
    Bar, Credential, DataProvider, Result, Series, SeriesProvider, Symbol, TapeError, VolumeBar,
    absorb,
};
use tracing::debug;

/// Candle endpoint.
const API_URL: &str = "https://finnhub.io/api/v1/stock/candle";

/// How far back each request reaches.
const LOOKBACK_SECS: i64 = 24 * 60 * 60;

/// Status value of a usable response.
const STATUS_OK: &str = "ok";

const PROVIDER_NAME: &str = "Finnhub";

/// Finnhub candle provider.
#[derive(Clone)]
pub struct FinnhubProvider {
    client: Client,
    credential: Credential,
    base_url: String,
}

impl fmt::Debug for FinnhubProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinnhubProvider")
            .field("credential", &self.credential)
            .finish()
    }
}

impl FinnhubProvider {
    /// Creates a provider with the given credential.
    #[must_use]
    pub fn new(credential: impl Into<Credential>) -> Self {
        Self::with_client(Client::new(), credential)
    }

    /// Creates a provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, credential: impl Into<Credential>) -> Self {
        Self {
            client,
            credential: credential.into(),
            base_url: API_URL.to_string(),
        }
    }

    /// Overrides the candle endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Result<Series> {
        let token = self
            .credential
            .key()
            .ok_or_else(|| TapeError::MissingCredential(PROVIDER_NAME.to_string()))?;

        let (from, to) = window(Utc::now().timestamp());
        let (from, to) = (from.to_string(), to.to_string());
        debug!(symbol = %symbol, from = %from, to = %to, "Finnhub candle request");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("resolution", "1"),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| TapeError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TapeError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(TapeError::Http {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
            });
        }

        let candles: CandleResponse = response
            .json()
            .await
            .map_err(|e| TapeError::Schema(e.to_string()))?;

        parse_candles(candles)
    }
}

impl DataProvider for FinnhubProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Finnhub stock candles, one-minute resolution (API key required)"
    }
}

#[async_trait]
impl SeriesProvider for FinnhubProvider {
    async fn fetch(&self, symbol: &Symbol) -> Series {
        absorb(PROVIDER_NAME, symbol, self.try_fetch(symbol).await)
    }
}

/// `[from, to]` request window ending at `now`.
const fn window(now: i64) -> (i64, i64) {
    (now - LOOKBACK_SECS, now)
}

/// Zips the parallel arrays once the status and column lengths check out.
fn parse_candles(candles: CandleResponse) -> Result<Series> {
    if let Some(message) = candles.error {
        return Err(TapeError::ProviderError {
            provider: PROVIDER_NAME.to_string(),
            message,
        });
    }

    match candles.s.as_deref() {
        Some(STATUS_OK) => {}
        other => {
            return Err(TapeError::ProviderError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("status {}", other.unwrap_or("missing")),
            });
        }
    }

    let n = candles.t.len();
    let lengths = [
        candles.o.len(),
        candles.h.len(),
        candles.l.len(),
        candles.c.len(),
        candles.v.len(),
    ];
    if lengths.iter().any(|&len| len != n) {
        return Err(TapeError::Schema(format!(
            "column lengths differ: t={n}, o/h/l/c/v={lengths:?}"
        )));
    }

    let mut series = Series::with_capacity(n);
    for i in 0..n {
        let bar = Bar::new(
            candles.t[i],
            candles.o[i],
            candles.h[i],
            candles.l[i],
            candles.c[i],
        );
        series.push(bar, VolumeBar::for_bar(&bar, candles.v[i]))?;
    }

    Ok(series)
}

// ============================================================================
// Finnhub API Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CandleResponse {
    s: Option<String>,
    error: Option<String>,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}
