#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Alpha Vantage intraday provider.
//!
//! The intraday payload is a map from local timestamp strings to labeled
//! OHLCV fields. Keys are parsed into instants using the time zone from the
//! payload's metadata and then sorted, so the output order never depends on
//! the map's enumeration order or on the key format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tape_alphavantage::AlphaVantageProvider;
//! use tape_core::{Credential, SeriesProvider, Symbol};
//!
//! let provider = AlphaVantageProvider::new(Credential::from_env("ALPHAVANTAGE_KEY"));
//! let series = provider.fetch(&Symbol::new("IBM")).await;
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::Client;
use serde_json::{Map, Value};
use tape_core::{
    Bar, Credential, DataProvider, Result, Series, SeriesProvider, Symbol, TapeError, VolumeBar,
    absorb,
};
use tracing::debug;

/// Query endpoint.
const API_URL: &str = "https://www.alphavantage.co/query";

/// Container holding the one-minute series.
const SERIES_KEY: &str = "Time Series (1min)";

/// Metadata block and the time zone field inside it.
const META_KEY: &str = "Meta Data";
const META_TIME_ZONE: &str = "6. Time Zone";

/// Zone used when the payload does not declare one.
const DEFAULT_TIME_ZONE: Tz = chrono_tz::US::Eastern;

/// Timestamp key layout, e.g. `2024-01-02 09:30:00`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Marker fields carried by error and quota payloads.
const ERROR_MARKER: &str = "Error Message";
const RATE_LIMIT_MARKERS: &[&str] = &["Note", "Information"];

const PROVIDER_NAME: &str = "AlphaVantage";

/// Alpha Vantage intraday provider.
#[derive(Clone)]
pub struct AlphaVantageProvider {
    client: Client,
    credential: Credential,
    base_url: String,
}

impl fmt::Debug for AlphaVantageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AlphaVantageProvider {
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

    /// Overrides the query endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn try_fetch(&self, symbol: &Symbol) -> Result<Series> {
        let api_key = self
            .credential
            .key()
            .ok_or_else(|| TapeError::MissingCredential(PROVIDER_NAME.to_string()))?;

        debug!(symbol = %symbol, "Alpha Vantage intraday request");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol.as_str()),
                ("interval", "1min"),
                ("apikey", api_key),
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

        let payload: Value = response
            .json()
            .await
            .map_err(|e| TapeError::Schema(e.to_string()))?;

        parse_intraday(&payload)
    }
}

impl DataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Alpha Vantage"
    }

    fn description(&self) -> &str {
        "Alpha Vantage intraday time series, one-minute resolution (API key required)"
    }
}

#[async_trait]
impl SeriesProvider for AlphaVantageProvider {
    async fn fetch(&self, symbol: &Symbol) -> Series {
        absorb(PROVIDER_NAME, symbol, self.try_fetch(symbol).await)
    }
}

/// Normalizes an intraday payload.
fn parse_intraday(payload: &Value) -> Result<Series> {
    if let Some(message) = payload.get(ERROR_MARKER) {
        return Err(TapeError::ProviderError {
            provider: PROVIDER_NAME.to_string(),
            message: message_text(message),
        });
    }

    if let Some(message) = RATE_LIMIT_MARKERS.iter().find_map(|k| payload.get(*k)) {
        return Err(TapeError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            message: message_text(message),
        });
    }

    let points = payload
        .get(SERIES_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| TapeError::Schema(format!("missing {SERIES_KEY:?}")))?;

    let tz = time_zone(payload);
    let mut rows = points
        .iter()
        .map(|(key, point)| Ok((instant(key, tz)?, point)))
        .collect::<Result<Vec<_>>>()?;
    rows.sort_by_key(|(time, _)| *time);

    let mut series = Series::with_capacity(rows.len());
    for (time, point) in rows {
        let point = point
            .as_object()
            .ok_or_else(|| TapeError::Schema(format!("point at {time} is not an object")))?;
        let bar = Bar::new(
            time,
            field(point, "1. open")?,
            field(point, "2. high")?,
            field(point, "3. low")?,
            field(point, "4. close")?,
        );
        series.push(bar, VolumeBar::for_bar(&bar, field(point, "5. volume")?))?;
    }

    Ok(series)
}

/// Zone declared in the metadata block, if it names a known zone.
fn time_zone(payload: &Value) -> Tz {
    payload
        .get(META_KEY)
        .and_then(|meta| meta.get(META_TIME_ZONE))
        .and_then(Value::as_str)
        .and_then(|name| name.parse().ok())
        .unwrap_or(DEFAULT_TIME_ZONE)
}

/// Unix seconds for a local timestamp key.
fn instant(key: &str, tz: Tz) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(key, TIMESTAMP_FORMAT)
        .map_err(|e| TapeError::Schema(format!("bad timestamp {key:?}: {e}")))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| TapeError::Schema(format!("timestamp {key:?} does not exist in {tz}")))
}

fn field(point: &Map<String, Value>, name: &str) -> Result<f64> {
    point
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| TapeError::Schema(format!("missing or invalid {name:?}")))
}

fn message_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}
