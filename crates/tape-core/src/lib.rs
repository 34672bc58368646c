#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the tape market-data gateway.
//!
//! This crate provides the foundational abstractions:
//!
//! - [`Bar`](types::Bar), [`VolumeBar`](types::VolumeBar) and
//!   [`Series`](types::Series) - the canonical schema
//! - [`DataProvider`](provider::DataProvider) - Base trait for all providers
//! - [`SeriesProvider`](provider::SeriesProvider) - One-minute candle series
//! - [`OutcomeSink`](outcome::OutcomeSink) - Per-attempt outcome reporting
//! - [`Credential`](credential::Credential) - Provider API key presence

/// Provider credential handling.
pub mod credential;
/// Error types for data operations.
pub mod error;
/// Fetch outcome reporting.
pub mod outcome;
/// Provider traits for fetching market data.
pub mod provider;
/// Core data types (Symbol, Bar, VolumeBar, Series, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use credential::Credential;
pub use error::{Result, TapeError};
pub use outcome::{
    ALL_PROVIDERS, FetchOutcome, FetchStatus, OutcomeSink, RecordingSink, TracingSink,
    USAGE_STAT_TARGET,
};
pub use provider::{DataProvider, SeriesProvider, absorb};
pub use types::{
    BAR_INTERVAL_SECS, Bar, BarColor, NO_DATA_LABEL, QueryResult, SIMULATED_LABEL, Series, Symbol,
    VolumeBar, truncate_to_minute,
};
