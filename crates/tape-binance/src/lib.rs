#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Binance kline provider.
//!
//! One adapter serves both Binance mirrors. [`BinanceEndpoint`] selects the
//! network target; the normalization path is shared.
//!
//! # Example
//!
//! ```no_run
//! use tape_binance::{BinanceEndpoint, BinanceProvider};
//! use tape_core::{SeriesProvider, Symbol};
//!
//! # async fn example() {
//! let provider = BinanceProvider::new(BinanceEndpoint::Global);
//! let series = provider.fetch(&Symbol::new("btc/usd")).await;
//! println!("Fetched {} bars", series.len());
//! # }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tape_core::{
    Bar, DataProvider, Result, Series, SeriesProvider, Symbol, TapeError, VolumeBar, absorb,
};
use tracing::debug;

/// Global endpoint.
pub const GLOBAL_API_URL: &str = "https://api.binance.com";

/// Region-restricted US endpoint.
pub const US_API_URL: &str = "https://api.binance.us";

/// Kline resolution requested from the venue.
const KLINE_INTERVAL: &str = "1m";

/// Number of klines requested.
const KLINE_LIMIT: u32 = 500;

/// Combined tickers clients type, mapped to the venue's USDT quote pairs.
const SYMBOL_ALIASES: &[(&str, &str)] = &[("BTCUSD", "BTCUSDT"), ("ETHUSD", "ETHUSDT")];

/// Which Binance mirror to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinanceEndpoint {
    /// api.binance.com
    Global,
    /// api.binance.us
    Us,
}

impl BinanceEndpoint {
    /// Base URL of this mirror.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Global => GLOBAL_API_URL,
            Self::Us => US_API_URL,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Global => "Binance.com",
            Self::Us => "Binance.us",
        }
    }

    const fn display_name(&self) -> &'static str {
        match self {
            Self::Global => "Binance",
            Self::Us => "Binance US",
        }
    }
}

/// Binance kline provider.
#[derive(Debug, Clone)]
pub struct BinanceProvider {
    client: Client,
    endpoint: BinanceEndpoint,
    base_url: String,
}

impl BinanceProvider {
    /// Creates a provider for `endpoint` with a default HTTP client.
    #[must_use]
    pub fn new(endpoint: BinanceEndpoint) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a provider for `endpoint` with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, endpoint: BinanceEndpoint) -> Self {
        Self {
            client,
            endpoint,
            base_url: endpoint.base_url().to_string(),
        }
    }

    /// Points the provider at a different host, keeping its identity.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The mirror this provider represents.
    #[must_use]
    pub const fn endpoint(&self) -> BinanceEndpoint {
        self.endpoint
    }

    fn klines_url(&self) -> String {
        format!("{}/api/v3/klines", self.base_url.trim_end_matches('/'))
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Result<Series> {
        let pair = normalize_symbol(symbol);
        if pair.is_empty() {
            return Err(TapeError::InvalidParameter(format!(
                "symbol {symbol:?} has no alphanumeric characters"
            )));
        }

        let url = self.klines_url();
        let limit = KLINE_LIMIT.to_string();
        debug!(url = %url, pair = %pair, "Fetching klines");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", pair.as_str()),
                ("interval", KLINE_INTERVAL),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TapeError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(TapeError::RateLimited {
                provider: self.name().to_string(),
                message: format!("HTTP {status}"),
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<ApiError>(&text) {
                debug!(code = error.code, msg = %error.msg, "Binance rejected request");
            }
            return Err(TapeError::Http {
                provider: self.name().to_string(),
                status: status.as_u16(),
            });
        }

        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| TapeError::Schema(e.to_string()))?;

        parse_klines(&rows)
    }
}

impl DataProvider for BinanceProvider {
    fn name(&self) -> &str {
        self.endpoint.name()
    }

    fn display_name(&self) -> &str {
        self.endpoint.display_name()
    }

    fn description(&self) -> &str {
        "Binance spot klines, one-minute resolution"
    }
}

#[async_trait]
impl SeriesProvider for BinanceProvider {
    async fn fetch(&self, symbol: &Symbol) -> Series {
        absorb(self.name(), symbol, self.try_fetch(symbol).await)
    }
}

/// Venue pair for a client ticker: compacted, then aliased.
#[must_use]
pub fn normalize_symbol(symbol: &Symbol) -> String {
    let compact = symbol.compact();
    SYMBOL_ALIASES
        .iter()
        .find(|(from, _)| *from == compact)
        .map_or(compact, |(_, to)| (*to).to_string())
}

/// Normalizes kline rows `[openTimeMs, open, high, low, close, volume, ...]`.
fn parse_klines(rows: &[Vec<Value>]) -> Result<Series> {
    let mut series = Series::with_capacity(rows.len());

    for row in rows {
        if row.len() < 6 {
            return Err(TapeError::Schema(format!(
                "kline has {} fields, expected at least 6",
                row.len()
            )));
        }

        let open_time_ms = row[0]
            .as_i64()
            .ok_or_else(|| TapeError::Schema(format!("bad kline open time: {}", row[0])))?;
        let time = open_time_ms.div_euclid(1000);

        let bar = Bar::new(
            time,
            number(&row[1])?,
            number(&row[2])?,
            number(&row[3])?,
            number(&row[4])?,
        );
        let volume = VolumeBar::for_bar(&bar, number(&row[5])?);
        series.push(bar, volume)?;
    }

    Ok(series)
}

/// Reads a price or quantity sent either as a decimal string or a number.
fn number(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| TapeError::Schema(format!("not a number: {s:?}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| TapeError::Schema(format!("not a number: {n}"))),
        other => Err(TapeError::Schema(format!("not a number: {other}"))),
    }
}

// ============================================================================
// Binance API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(value).unwrap()
    }

    /// Answers one connection per entry of `statuses`, in order.
    async fn stub_server(statuses: &'static [u16]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = [0_u8; 4096];
                let _ = socket.read(&mut request).await;
                let body = "{}";
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(&Symbol::new("btc/usd")), "BTCUSDT");
        assert_eq!(normalize_symbol(&Symbol::new("ETH-USD")), "ETHUSDT");
        assert_eq!(normalize_symbol(&Symbol::new("solusdt")), "SOLUSDT");
        assert_eq!(normalize_symbol(&Symbol::new("BTCUSDT")), "BTCUSDT");
        assert_eq!(normalize_symbol(&Symbol::new("/-")), "");
    }

    #[test]
    fn test_endpoint_identity() {
        let global = BinanceProvider::new(BinanceEndpoint::Global);
        let us = BinanceProvider::new(BinanceEndpoint::Us);

        assert_eq!(global.name(), "Binance.com");
        assert_eq!(global.display_name(), "Binance");
        assert_eq!(us.name(), "Binance.us");
        assert_eq!(us.display_name(), "Binance US");
        assert_eq!(us.klines_url(), "https://api.binance.us/api/v3/klines");
    }

    #[test]
    fn test_with_base_url_keeps_identity() {
        let provider =
            BinanceProvider::new(BinanceEndpoint::Us).with_base_url("http://localhost:9000/");
        assert_eq!(provider.klines_url(), "http://localhost:9000/api/v3/klines");
        assert_eq!(provider.endpoint(), BinanceEndpoint::Us);
    }

    #[test]
    fn test_parse_klines() {
        let payload = rows(json!([
            [
                1_700_000_040_000_i64, "100.5", "101.0", "100.0", "100.8", "12.5",
                1_700_000_099_999_i64, "0", 10, "0", "0", "0"
            ],
            [
                1_700_000_100_000_i64, "100.8", "100.9", "99.5", "99.9", "3.25",
                1_700_000_159_999_i64, "0", 4, "0", "0", "0"
            ]
        ]));

        let series = parse_klines(&payload).unwrap();
        assert_eq!(series.len(), 2);

        let (bar, volume) = series.iter().next().unwrap();
        assert_eq!(bar.time, 1_700_000_040);
        assert_eq!(bar.open, 100.5);
        assert_eq!(bar.high, 101.0);
        assert_eq!(bar.low, 100.0);
        assert_eq!(bar.close, 100.8);
        assert_eq!(volume.value, 12.5);
        assert_eq!(volume.color, tape_core::BarColor::Up);
        assert_eq!(series.volume()[1].color, tape_core::BarColor::Down);
        assert!(series.is_contiguous());
    }

    #[test]
    fn test_parse_klines_accepts_numeric_fields() {
        let payload = rows(json!([[60_500, 1.0, 2.0, 0.5, 1.5, 7]]));
        let series = parse_klines(&payload).unwrap();
        assert_eq!(series.candles()[0].time, 60);
        assert_eq!(series.volume()[0].value, 7.0);
    }

    #[test]
    fn test_parse_klines_rejects_malformed_rows() {
        assert!(parse_klines(&rows(json!([[60_000, "1.0", "2.0"]]))).is_err());
        assert!(parse_klines(&rows(json!([[60_000, "x", "2", "1", "1.5", "1"]]))).is_err());
        assert!(parse_klines(&rows(json!([["t", "1", "2", "1", "1.5", "1"]]))).is_err());
    }

    #[test]
    fn test_parse_klines_empty() {
        assert!(parse_klines(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_no_data() {
        let provider =
            BinanceProvider::new(BinanceEndpoint::Global).with_base_url("http://127.0.0.1:1");
        let series = provider.fetch(&Symbol::new("BTCUSD")).await;
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_symbol_is_no_data() {
        let provider =
            BinanceProvider::new(BinanceEndpoint::Global).with_base_url("http://127.0.0.1:1");
        assert!(provider.fetch(&Symbol::new("///")).await.is_empty());
    }

    #[tokio::test]
    async fn test_protocol_errors_are_no_data() {
        let base_url = stub_server(&[503, 429, 418, 503]).await;
        let provider = BinanceProvider::new(BinanceEndpoint::Us).with_base_url(base_url);
        let symbol = Symbol::new("BTCUSD");

        assert!(matches!(
            provider.try_fetch(&symbol).await,
            Err(TapeError::Http { status: 503, .. })
        ));
        assert!(matches!(
            provider.try_fetch(&symbol).await,
            Err(TapeError::RateLimited { .. })
        ));
        assert!(matches!(
            provider.try_fetch(&symbol).await,
            Err(TapeError::RateLimited { .. })
        ));
        assert!(provider.fetch(&symbol).await.is_empty());
    }
}
