#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Synthetic market data.
//!
//! # Example
//!
//! ```
//! use tape_synth::SyntheticGenerator;
//!
//! let mut generator = SyntheticGenerator::seeded(7);
//! let series = generator.seed_history_at(3, 100.0, 1_700_000_030).unwrap();
//! assert_eq!(series.len(), 3);
//! assert_eq!(series.candles()[2].time, 1_699_999_980 - 60);
//! ```

/// Seeded history, next-bar and intra-bar generation.
pub mod generator;
/// Periodic bar evolution.
pub mod session;

pub use generator::{
    HISTORY_VOLATILITY, SyntheticGenerator, TICK_VOLATILITY, advance_bar, next_bar,
};
pub use session::{
    Clock, DEFAULT_TICK_INTERVAL, FixedClock, LiveEvent, LiveSession, LiveState, SystemClock,
    Transition, decide, step,
};
