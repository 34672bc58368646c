//! Fetch outcome reporting.
//!
//! Each provider attempt produces one [`FetchOutcome`]. Sinks are synchronous
//! and infallible: reporting never blocks or alters the fallback chain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::types::Symbol;

/// Provider tag used for the terminal failure outcome.
pub const ALL_PROVIDERS: &str = "AllProviders";

/// Tracing target of outcome events.
pub const USAGE_STAT_TARGET: &str = "usage_stat";

/// Result of one attempt in the fallback chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// The provider returned a non-empty series.
    Success,
    /// The provider returned nothing, the chain moves on.
    Fallback,
    /// Every provider was tried without success.
    Failure,
}

impl FetchStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt's outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Requested symbol.
    pub symbol: Symbol,
    /// Provider name, or [`ALL_PROVIDERS`].
    pub provider: String,
    /// Attempt status.
    pub status: FetchStatus,
}

impl FetchOutcome {
    /// Creates an outcome stamped with the current time.
    #[must_use]
    pub fn now(symbol: &Symbol, provider: impl Into<String>, status: FetchStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.clone(),
            provider: provider.into(),
            status,
        }
    }
}

/// Receiver of fetch outcomes.
pub trait OutcomeSink: Send + Sync + fmt::Debug {
    /// Records one outcome.
    fn record(&self, outcome: &FetchOutcome);
}

/// Emits each outcome as a structured `usage_stat` tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&self, outcome: &FetchOutcome) {
        info!(
            target: USAGE_STAT_TARGET,
            r#type = "usage_stat",
            timestamp = %outcome.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            symbol = %outcome.symbol,
            provider = %outcome.provider,
            status = %outcome.status,
            "Fetch outcome"
        );
    }
}

/// Keeps outcomes in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<FetchOutcome>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<FetchOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(provider, status)` pairs in emission order.
    #[must_use]
    pub fn trail(&self) -> Vec<(String, FetchStatus)> {
        self.outcomes()
            .into_iter()
            .map(|o| (o.provider, o.status))
            .collect()
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, outcome: &FetchOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
    }
}
