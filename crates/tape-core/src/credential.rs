//! Provider credentials.
//!
//! Only presence matters: a [`Credential`] is either usable or it is not.
//! Absent, blank, and template placeholder values all count as absent.

use serde::Deserialize;
use std::fmt;

/// Values shipped in sample env files that must never reach an upstream.
const PLACEHOLDERS: &[&str] = &["changeme", "your_api_key", "your_api_key_here", "xxx"];

/// An optional provider API key.
///
/// Deserializes from an optional string, so config files can carry keys.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub struct Credential(Option<String>);

impl Credential {
    /// Creates a credential from a raw key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    /// Creates an absent credential.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Reads a credential from an environment variable.
    #[must_use]
    pub fn from_env(var: &str) -> Self {
        Self(std::env::var(var).ok())
    }

    /// Returns the key if it is present and not a placeholder.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        let key = self.0.as_deref()?.trim();
        if key.is_empty() || is_placeholder(key) {
            return None;
        }
        Some(key)
    }

    /// Returns true if the key can be sent upstream.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.key().is_some()
    }
}

/// Matches the fixed placeholders and the `your_<provider>_key_here` family.
fn is_placeholder(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
        || (lower.starts_with("your_") && lower.ends_with("_key_here"))
}

impl From<Option<String>> for Credential {
    fn from(key: Option<String>) -> Self {
        Self(key)
    }
}

impl From<&str> for Credential {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_present() {
            "[REDACTED]"
        } else {
            "[ABSENT]"
        };
        f.debug_tuple("Credential").field(&state).finish()
    }
}
