//! HTTP gateway for the tape fallback chain.
//!
//! Serves one-shot series queries, simulated live bars over server-sent
//! events, and static chart assets.

pub mod config;
pub mod routes;
pub mod server;

// Re-export the gateway library for integration
pub use tape;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
