//! Core data types for one-minute market data.
//!
//! This module defines the canonical schema every producer and consumer
//! shares:
//!
//! - [`Symbol`] - Ticker as requested by the client
//! - [`Bar`] - OHLC price record for one minute
//! - [`VolumeBar`] - Traded quantity paired with a [`Bar`]
//! - [`Series`] - Time-ordered pairs of bars and volume bars
//! - [`QueryResult`] - Series tagged with the source that produced it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TapeError};

/// Width of one aggregation window in seconds.
pub const BAR_INTERVAL_SECS: i64 = 60;

/// Source label returned when no provider produced data.
pub const NO_DATA_LABEL: &str = "No Data";

/// Source label for series produced by the synthetic generator.
pub const SIMULATED_LABEL: &str = "Simulated";

/// A ticker symbol as requested by a client.
///
/// The raw form is kept (trimmed) because vendor APIs expect the ticker as
/// typed; exchange venues use [`Symbol::compact`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol, trimming surrounding whitespace.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_string())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the symbol is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Upper-cased form with every non-alphanumeric character removed.
    ///
    /// `btc/usd`, `BTC-USD` and `BTCUSD` all compact to `BTCUSD`.
    #[must_use]
    pub fn compact(&self) -> String {
        self.0
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Rounds a unix timestamp down to its minute boundary.
#[must_use]
pub const fn truncate_to_minute(time: i64) -> i64 {
    time - time.rem_euclid(BAR_INTERVAL_SECS)
}

/// OHLC price record for one aggregation window.
///
/// `time` is seconds since the unix epoch. Valid bars satisfy
/// `low <= min(open, close) <= max(open, close) <= high` with positive prices.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Window start, seconds since epoch.
    pub time: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price during the window.
    pub high: f64,
    /// Lowest price during the window.
    pub low: f64,
    /// Closing (or latest) price.
    pub close: f64,
}

impl Bar {
    /// Creates a new bar.
    #[must_use]
    pub const fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// A bar that has not moved yet: all four prices equal `price`.
    #[must_use]
    pub const fn flat(time: i64, price: f64) -> Self {
        Self::new(time, price, price, price, price)
    }

    /// True when the close is at or above the open.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Checks the OHLC ordering invariant and price positivity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }
}

/// Direction tag of a volume bar, serialized as the chart colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarColor {
    /// Close at or above open.
    #[serde(rename = "#26a69a")]
    Up,
    /// Close below open.
    #[serde(rename = "#ef5350")]
    Down,
}

impl BarColor {
    /// Colour for a bar.
    #[must_use]
    pub fn of(bar: &Bar) -> Self {
        if bar.is_up() { Self::Up } else { Self::Down }
    }
}

/// Traded quantity for the window of its paired [`Bar`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeBar {
    /// Same as the paired bar's time.
    pub time: i64,
    /// Traded quantity, never negative.
    pub value: f64,
    /// Direction of the paired bar.
    pub color: BarColor,
}

impl VolumeBar {
    /// Creates the volume bar paired with `bar`, deriving its colour.
    #[must_use]
    pub fn for_bar(bar: &Bar, value: f64) -> Self {
        Self {
            time: bar.time,
            value,
            color: BarColor::of(bar),
        }
    }
}

/// Time-ordered sequence of paired [`Bar`] and [`VolumeBar`] records.
///
/// Serializes as `{"candles": [...], "volume": [...]}`. Times are strictly
/// increasing and every pair shares its time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Series {
    candles: Vec<Bar>,
    volume: Vec<VolumeBar>,
}

impl Series {
    /// Creates an empty series.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            candles: Vec::new(),
            volume: Vec::new(),
        }
    }

    /// Creates an empty series with room for `capacity` pairs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            candles: Vec::with_capacity(capacity),
            volume: Vec::with_capacity(capacity),
        }
    }

    /// Appends a pair.
    ///
    /// Rejects invalid bars, negative volume, mismatched times and times that
    /// do not move forward.
    pub fn push(&mut self, bar: Bar, volume: VolumeBar) -> Result<()> {
        if !bar.is_valid() {
            return Err(TapeError::Schema(format!(
                "invalid bar at {}: o={} h={} l={} c={}",
                bar.time, bar.open, bar.high, bar.low, bar.close
            )));
        }
        if !(volume.value.is_finite() && volume.value >= 0.0) {
            return Err(TapeError::Schema(format!(
                "invalid volume at {}: {}",
                volume.time, volume.value
            )));
        }
        if volume.time != bar.time {
            return Err(TapeError::Schema(format!(
                "volume time {} does not match bar time {}",
                volume.time, bar.time
            )));
        }
        if let Some(last) = self.candles.last() {
            if bar.time <= last.time {
                return Err(TapeError::Schema(format!(
                    "bar time {} does not follow {}",
                    bar.time, last.time
                )));
            }
        }
        self.candles.push(bar);
        self.volume.push(volume);
        Ok(())
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Price bars in time order.
    #[must_use]
    pub fn candles(&self) -> &[Bar] {
        &self.candles
    }

    /// Volume bars in time order.
    #[must_use]
    pub fn volume(&self) -> &[VolumeBar] {
        &self.volume
    }

    /// Iterates over the pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Bar, &VolumeBar)> {
        self.candles.iter().zip(self.volume.iter())
    }

    /// The most recent pair.
    #[must_use]
    pub fn last(&self) -> Option<(Bar, VolumeBar)> {
        Some((*self.candles.last()?, *self.volume.last()?))
    }

    /// True when consecutive bars are exactly one window apart.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.candles
            .windows(2)
            .all(|w| w[1].time - w[0].time == BAR_INTERVAL_SECS)
    }

    /// Converts the series into a DataFrame with columns
    /// time, open, high, low, close, volume, up.
    #[cfg(feature = "polars")]
    pub fn to_dataframe(&self) -> Result<polars::prelude::DataFrame> {
        use polars::prelude::*;

        let col = |f: fn(&Bar) -> f64| self.candles.iter().map(f).collect::<Vec<f64>>();

        DataFrame::new(vec![
            Column::new(
                "time".into(),
                self.candles.iter().map(|b| b.time).collect::<Vec<i64>>(),
            ),
            Column::new("open".into(), col(|b| b.open)),
            Column::new("high".into(), col(|b| b.high)),
            Column::new("low".into(), col(|b| b.low)),
            Column::new("close".into(), col(|b| b.close)),
            Column::new(
                "volume".into(),
                self.volume.iter().map(|v| v.value).collect::<Vec<f64>>(),
            ),
            Column::new(
                "up".into(),
                self.volume
                    .iter()
                    .map(|v| v.color == BarColor::Up)
                    .collect::<Vec<bool>>(),
            ),
        ])
        .map_err(|e| TapeError::Schema(e.to_string()))
    }
}

/// Terminal value of a symbol query: a series and the label of its source.
///
/// Serializes as `{"candles": [...], "volume": [...], "source": "..."}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResult {
    /// The series, empty when no provider produced data.
    #[serde(flatten)]
    pub series: Series,
    /// Display name of the producing source, or [`NO_DATA_LABEL`].
    pub source: String,
}

impl QueryResult {
    /// Creates a result tagged with `source`.
    #[must_use]
    pub fn new(series: Series, source: impl Into<String>) -> Self {
        Self {
            series,
            source: source.into(),
        }
    }

    /// The result of an exhausted provider chain.
    #[must_use]
    pub fn no_data() -> Self {
        Self::new(Series::new(), NO_DATA_LABEL)
    }

    /// Returns true if no data was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(time: i64, open: f64, close: f64) -> (Bar, VolumeBar) {
        let bar = Bar::new(time, open, open.max(close) + 1.0, open.min(close) - 1.0, close);
        (bar, VolumeBar::for_bar(&bar, 10.0))
    }

    #[test]
    fn test_symbol_compact() {
        assert_eq!(Symbol::new(" btc/usd ").compact(), "BTCUSD");
        assert_eq!(Symbol::new("eth-usdt").compact(), "ETHUSDT");
        assert_eq!(Symbol::new("  AAPL").as_str(), "AAPL");
        assert!(Symbol::new("   ").is_empty());
    }

    #[test]
    fn test_truncate_to_minute() {
        assert_eq!(truncate_to_minute(1_700_000_059), 1_700_000_040);
        assert_eq!(truncate_to_minute(1_699_999_980), 1_699_999_980);
        assert_eq!(truncate_to_minute(1_699_999_979), 1_699_999_920);
        assert_eq!(truncate_to_minute(120), 120);
        assert_eq!(truncate_to_minute(-1), -60);
    }

    #[test]
    fn test_bar_validity() {
        assert!(Bar::new(60, 10.0, 11.0, 9.0, 10.5).is_valid());
        assert!(Bar::flat(60, 10.0).is_valid());
        assert!(!Bar::new(60, 10.0, 10.2, 9.0, 10.5).is_valid());
        assert!(!Bar::new(60, 10.0, 11.0, 10.1, 10.5).is_valid());
        assert!(!Bar::new(60, 0.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!Bar::new(60, f64::NAN, 11.0, 9.0, 10.5).is_valid());
    }

    #[test]
    fn test_volume_colour() {
        let up = Bar::new(0, 10.0, 11.0, 9.0, 10.0);
        let down = Bar::new(0, 10.0, 11.0, 9.0, 9.5);
        assert_eq!(VolumeBar::for_bar(&up, 1.0).color, BarColor::Up);
        assert_eq!(VolumeBar::for_bar(&down, 1.0).color, BarColor::Down);
    }

    #[test]
    fn test_series_push_rejects_out_of_order() {
        let mut series = Series::new();
        let (b1, v1) = pair(120, 10.0, 11.0);
        let (b0, v0) = pair(60, 10.0, 11.0);
        series.push(b1, v1).unwrap();
        assert!(series.push(b0, v0).is_err());
        assert!(series.push(b1, v1).is_err());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_series_push_rejects_mismatched_volume() {
        let mut series = Series::new();
        let (bar, mut volume) = pair(60, 10.0, 11.0);
        volume.time = 120;
        assert!(series.push(bar, volume).is_err());
        volume.time = 60;
        volume.value = -1.0;
        assert!(series.push(bar, volume).is_err());
        assert!(series.is_empty());
    }

    #[test]
    fn test_series_contiguity_and_last() {
        let mut series = Series::new();
        for t in [60, 120, 180] {
            let (b, v) = pair(t, 10.0, 10.5);
            series.push(b, v).unwrap();
        }
        assert!(series.is_contiguous());
        assert_eq!(series.last().map(|(b, _)| b.time), Some(180));

        let (b, v) = pair(300, 10.0, 10.5);
        series.push(b, v).unwrap();
        assert!(!series.is_contiguous());
    }

    #[test]
    fn test_query_result_wire_shape() {
        let mut series = Series::new();
        let (b, v) = pair(1000, 10.0, 10.5);
        series.push(b, v).unwrap();

        let json = serde_json::to_value(QueryResult::new(series, "Binance")).unwrap();
        assert_eq!(json["source"], "Binance");
        assert_eq!(json["candles"][0]["time"], 1000);
        assert_eq!(json["candles"][0]["close"], 10.5);
        assert_eq!(json["volume"][0]["value"], 10.0);
        assert_eq!(json["volume"][0]["color"], "#26a69a");
    }

    #[test]
    fn test_no_data() {
        let result = QueryResult::no_data();
        assert!(result.is_empty());
        assert_eq!(result.source, NO_DATA_LABEL);
    }

    #[cfg(feature = "polars")]
    #[test]
    fn test_to_dataframe() {
        let mut series = Series::new();
        for t in [60, 120] {
            let (b, v) = pair(t, 10.0, 10.5);
            series.push(b, v).unwrap();
        }
        let df = series.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 7);
    }
}
