//! Error types for data operations.
//!
//! [`TapeError`] covers everything that can go wrong while fetching or
//! normalizing a provider response. These errors stay inside adapters: the
//! public fetch path converts them into an empty [`Series`](crate::Series).

use thiserror::Error;

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum TapeError {
    /// Transport failure (connection refused, DNS, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream answered with a non-success HTTP status.
    #[error("HTTP {status} from {provider}")]
    Http {
        /// The provider that answered.
        provider: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Rate limit or quota marker returned by a provider.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Provider supplied message, if any.
        message: String,
    },

    /// The provider reported an error inside an otherwise valid payload.
    #[error("{provider} reported: {message}")]
    ProviderError {
        /// The provider that reported the error.
        provider: String,
        /// Provider supplied message.
        message: String,
    },

    /// The payload did not have the expected shape.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The provider needs a credential that is absent or a placeholder.
    #[error("No credential configured for {0}")]
    MissingCredential(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl TapeError {
    /// Returns true for the configuration gap class, which is expected and
    /// not worth a warning.
    #[must_use]
    pub const fn is_configuration_gap(&self) -> bool {
        matches!(self, Self::MissingCredential(_))
    }
}

/// Result type alias using [`TapeError`].
pub type Result<T> = std::result::Result<T, TapeError>;
