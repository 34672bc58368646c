#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tape/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fallback market-data gateway.
//!
//! This crate re-exports the core types and the provider adapters, and
//! provides a [`FallbackChain`] that queries providers in a fixed order until
//! one returns data.
//!
//! # Features
//!
//! - `binance` - Binance global and US kline providers
//! - `alphavantage` - Alpha Vantage intraday provider
//! - `finnhub` - Finnhub candle provider
//! - `polars` - DataFrame conversion for series

// Core types and traits
pub use tape_core::*;

/// Synthetic history and live session simulation.
pub use tape_synth as synth;

// Providers
#[cfg(feature = "alphavantage")]
pub use tape_alphavantage::AlphaVantageProvider;
#[cfg(feature = "binance")]
pub use tape_binance::{BinanceEndpoint, BinanceProvider};
#[cfg(feature = "finnhub")]
pub use tape_finnhub::FinnhubProvider;

mod chain;
pub use chain::{FallbackChain, ProviderCredentials};
