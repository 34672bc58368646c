//! Synthetic one-minute bars.
//!
//! Three operations, none of which does I/O:
//!
//! - [`SyntheticGenerator::seed_history`] - a random-walk history ending at the current minute
//! - [`next_bar`] - opens the following window at the prior close
//! - [`advance_bar`] - one intra-bar tick on the running close
//!
//! Every transition returns fresh values; inputs are never mutated.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tape_core::{
    BAR_INTERVAL_SECS, Bar, BarColor, Result, Series, TapeError, VolumeBar, truncate_to_minute,
};

/// Per-bar volatility of the seeded history.
pub const HISTORY_VOLATILITY: f64 = 0.005;

/// Per-tick volatility inside a bar.
pub const TICK_VOLATILITY: f64 = 0.001;

/// Wicks extend past the body by up to this fraction of `open * volatility`.
const MAX_WICK: f64 = 0.5;

/// Range used when a start price is not supplied.
const START_PRICE_RANGE: std::ops::Range<f64> = 50.0..1050.0;

/// Random-walk bar generator with an injected RNG.
///
/// Use [`SyntheticGenerator::seeded`] for reproducible output.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator<R = StdRng> {
    rng: R,
}

impl SyntheticGenerator<StdRng> {
    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a deterministic generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for SyntheticGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> SyntheticGenerator<R> {
    /// Wraps an arbitrary random source.
    pub const fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Picks a plausible starting price.
    pub fn random_start_price(&mut self) -> f64 {
        self.rng.gen_range(START_PRICE_RANGE)
    }

    /// Seeds `count` bars ending just before the current minute.
    pub fn seed_history(&mut self, count: usize, start_price: f64) -> Result<Series> {
        self.seed_history_at(count, start_price, Utc::now().timestamp())
    }

    /// Seeds `count` bars against an explicit clock reading.
    ///
    /// With `t0 = now - now mod 60`, the bars cover `t0 - 60 * count` up to
    /// `t0 - 60`, leaving the window at `t0` to be opened live.
    pub fn seed_history_at(&mut self, count: usize, start_price: f64, now: i64) -> Result<Series> {
        if count == 0 {
            return Err(TapeError::InvalidParameter(
                "history length must be at least 1".to_string(),
            ));
        }
        if !(start_price.is_finite() && start_price > 0.0) {
            return Err(TapeError::InvalidParameter(format!(
                "start price must be positive, got {start_price}"
            )));
        }

        let steps = i64::try_from(count)
            .map_err(|_| TapeError::InvalidParameter(format!("history too long: {count}")))?;
        let mut time = truncate_to_minute(now) - steps * BAR_INTERVAL_SECS;
        let mut price = start_price;
        let mut series = Series::with_capacity(count);

        for _ in 0..count {
            let (bar, volume) = self.walk(time, price);
            series.push(bar, volume)?;
            price = bar.close;
            time += BAR_INTERVAL_SECS;
        }

        Ok(series)
    }

    /// One history step starting at `open`.
    fn walk(&mut self, time: i64, open: f64) -> (Bar, VolumeBar) {
        let change = open * HISTORY_VOLATILITY * self.rng.gen_range(-1.0..1.0);
        let close = open + change;
        let high =
            open.max(close) + open * HISTORY_VOLATILITY * self.rng.gen_range(0.0..MAX_WICK);
        let low = open.min(close) - open * HISTORY_VOLATILITY * self.rng.gen_range(0.0..MAX_WICK);

        let fraction = (change / open).abs();
        let value = (self.rng.gen_range(100.0..1000.0) * (1.0 + 10.0 * fraction)).floor();

        let bar = Bar::new(time, open, high, low, close);
        (bar, VolumeBar::for_bar(&bar, value))
    }

    /// Opens the window after `prior`. See [`next_bar`].
    pub fn next_bar(&self, prior: &Bar) -> (Bar, VolumeBar) {
        next_bar(prior)
    }

    /// Applies one intra-bar tick. See [`advance_bar`].
    pub fn advance_bar(&mut self, bar: &Bar, volume: &VolumeBar) -> (Bar, VolumeBar) {
        advance_bar(&mut self.rng, bar, volume)
    }
}

/// Opens the window one interval after `prior`, flat at the prior close with
/// zero volume.
#[must_use]
pub fn next_bar(prior: &Bar) -> (Bar, VolumeBar) {
    let bar = Bar::flat(prior.time + BAR_INTERVAL_SECS, prior.close);
    let volume = VolumeBar {
        time: bar.time,
        value: 0.0,
        color: BarColor::Up,
    };
    (bar, volume)
}

/// Moves the running close by up to [`TICK_VOLATILITY`] and adds 1 to 9 units
/// of volume. High and low only ever widen.
pub fn advance_bar<R: Rng>(rng: &mut R, bar: &Bar, volume: &VolumeBar) -> (Bar, VolumeBar) {
    let change = bar.close * TICK_VOLATILITY * rng.gen_range(-1.0..1.0);
    let close = bar.close + change;

    let next = Bar {
        high: bar.high.max(close),
        low: bar.low.min(close),
        close,
        ..*bar
    };
    let next_volume = VolumeBar {
        value: volume.value + rng.gen_range(1.0_f64..10.0).floor(),
        ..VolumeBar::for_bar(&next, 0.0)
    };
    (next, next_volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_030;
    const MINUTE: i64 = 1_699_999_980;

    #[test]
    fn test_seed_history_times() {
        let mut generator = SyntheticGenerator::seeded(1);
        let series = generator.seed_history_at(3, 100.0, NOW).unwrap();

        let times: Vec<i64> = series.candles().iter().map(|b| b.time).collect();
        assert_eq!(times, vec![MINUTE - 180, MINUTE - 120, MINUTE - 60]);
        assert!(series.candles().iter().all(Bar::is_valid));
        assert_eq!(series.candles()[0].open, 100.0);
    }

    #[test]
    fn test_seed_history_is_a_valid_walk() {
        let mut generator = SyntheticGenerator::seeded(42);
        let series = generator.seed_history_at(500, 250.0, NOW).unwrap();

        assert_eq!(series.len(), 500);
        assert!(series.is_contiguous());
        for window in series.candles().windows(2) {
            assert_eq!(window[1].open, window[0].close);
        }
        for (bar, volume) in series.iter() {
            assert!(bar.is_valid());
            assert_eq!(volume.time, bar.time);
            assert_eq!(volume.color, BarColor::of(bar));
            assert!(volume.value >= 100.0);
            assert_eq!(volume.value, volume.value.floor());
            let move_fraction = (bar.close - bar.open).abs() / bar.open;
            assert!(move_fraction <= HISTORY_VOLATILITY + 1e-12);
        }
    }

    #[test]
    fn test_seed_history_is_reproducible() {
        let a = SyntheticGenerator::seeded(9)
            .seed_history_at(20, 100.0, NOW)
            .unwrap();
        let b = SyntheticGenerator::seeded(9)
            .seed_history_at(20, 100.0, NOW)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_history_preconditions() {
        let mut generator = SyntheticGenerator::seeded(1);
        assert!(generator.seed_history_at(0, 100.0, NOW).is_err());
        assert!(generator.seed_history_at(3, 0.0, NOW).is_err());
        assert!(generator.seed_history_at(3, -5.0, NOW).is_err());
        assert!(generator.seed_history_at(3, f64::NAN, NOW).is_err());
    }

    #[test]
    fn test_next_bar_is_flat_at_prior_close() {
        let prior = Bar::new(MINUTE, 10.0, 12.0, 9.0, 11.5);
        let (bar, volume) = next_bar(&prior);

        assert_eq!(bar, Bar::flat(MINUTE + 60, 11.5));
        assert_eq!(volume.time, MINUTE + 60);
        assert_eq!(volume.value, 0.0);
        assert_eq!(volume.color, BarColor::Up);
    }

    #[test]
    fn test_advance_bar_widens_only() {
        let mut generator = SyntheticGenerator::seeded(3);
        let mut bar = Bar::flat(MINUTE, 100.0);
        let mut volume = VolumeBar::for_bar(&bar, 0.0);

        for _ in 0..1_000 {
            let (next, next_volume) = generator.advance_bar(&bar, &volume);
            assert_eq!(next.time, bar.time);
            assert_eq!(next.open, bar.open);
            assert!(next.high >= bar.high);
            assert!(next.low <= bar.low);
            assert!(next.is_valid());
            assert!(next_volume.value > volume.value);
            assert!(next_volume.value - volume.value < 10.0);
            assert_eq!(next_volume.color, BarColor::of(&next));
            bar = next;
            volume = next_volume;
        }
    }

    #[test]
    fn test_advance_bar_leaves_input_untouched() {
        let mut generator = SyntheticGenerator::seeded(5);
        let bar = Bar::flat(MINUTE, 50.0);
        let volume = VolumeBar::for_bar(&bar, 7.0);
        let _ = generator.advance_bar(&bar, &volume);
        assert_eq!(bar, Bar::flat(MINUTE, 50.0));
        assert_eq!(volume.value, 7.0);
    }

    #[test]
    fn test_random_start_price_range() {
        let mut generator = SyntheticGenerator::seeded(11);
        for _ in 0..100 {
            let price = generator.random_start_price();
            assert!((50.0..1050.0).contains(&price));
        }
    }
}
