//! Provider traits for fetching market data.
//!
//! This module defines the core provider traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`SeriesProvider`] - One-minute candle series for a symbol
//!
//! Adapters never fail past their own boundary. They implement a fallible
//! internal fetch and funnel the result through [`absorb`], which logs the
//! error and hands back an empty [`Series`].

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, warn};

use crate::{
    error::Result,
    types::{Series, Symbol},
};

/// Base trait for all data providers.
///
/// All data providers must implement this trait to provide basic metadata
/// about the provider.
pub trait DataProvider: Send + Sync + Debug {
    /// Identifier used in outcome events (e.g., "Binance.com").
    fn name(&self) -> &str;

    /// Label shown to clients as the data source (e.g., "Binance").
    fn display_name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for one-minute OHLCV series.
#[async_trait]
pub trait SeriesProvider: DataProvider {
    /// Fetches the most recent one-minute series for `symbol`.
    ///
    /// An empty series means "no data, try the next provider". Transport,
    /// protocol, schema and configuration failures all end up here as empty.
    async fn fetch(&self, symbol: &Symbol) -> Series;
}

/// Converts an adapter's internal result into the "series or empty" contract.
pub fn absorb(provider: &str, symbol: &Symbol, result: Result<Series>) -> Series {
    match result {
        Ok(series) => {
            debug!(provider, symbol = %symbol, bars = series.len(), "Provider returned series");
            series
        }
        Err(e) if e.is_configuration_gap() => {
            debug!(provider, symbol = %symbol, error = %e, "Provider skipped");
            Series::new()
        }
        Err(e) => {
            warn!(provider, symbol = %symbol, error = %e, "Provider failed, treating as no data");
            Series::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TapeError;
    use crate::types::{Bar, VolumeBar};

    #[test]
    fn test_absorb_passes_series_through() {
        let mut series = Series::new();
        let bar = Bar::flat(60, 1.0);
        series.push(bar, VolumeBar::for_bar(&bar, 0.0)).unwrap();

        let out = absorb("test", &Symbol::new("X"), Ok(series.clone()));
        assert_eq!(out, series);
    }

    #[test]
    fn test_absorb_swallows_every_error_class() {
        let symbol = Symbol::new("X");
        let errors = vec![
            TapeError::Network("refused".into()),
            TapeError::Http {
                provider: "test".into(),
                status: 503,
            },
            TapeError::Schema("missing".into()),
            TapeError::MissingCredential("test".into()),
        ];
        for e in errors {
            assert!(absorb("test", &symbol, Err(e)).is_empty());
        }
    }
}
