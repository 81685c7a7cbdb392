//! Error types for the source adapters.

use thiserror::Error;

/// Errors raised while querying an external search source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failure that may clear up on its own (transport, unreadable body,
    /// generic API error, rate limiting)
    #[error("{source_id} query failed: {message}")]
    Transient {
        /// Source tag
        source_id: String,
        /// Error message
        message: String,
    },

    /// Failure that will not clear up by retrying (bad credentials, disabled
    /// account)
    #[error("{source_id} rejected the request: {message}")]
    Permanent {
        /// Source tag
        source_id: String,
        /// Error message
        message: String,
    },

    /// Rate limiting persisted through every retry
    #[error("{source_id} still failing after {attempts} attempts: {cause}")]
    RetriesExhausted {
        /// Source tag
        source_id: String,
        /// Total attempts made, including the first
        attempts: u32,
        /// Error returned by the final attempt
        cause: Box<SourceError>,
    },
}

impl SourceError {
    /// Build a transient error.
    pub fn transient(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Build a permanent error.
    pub fn permanent(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Whether retrying can never help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    /// Source that raised the error.
    #[must_use]
    pub fn source_id(&self) -> &str {
        match self {
            Self::Transient { source_id, .. }
            | Self::Permanent { source_id, .. }
            | Self::RetriesExhausted { source_id, .. } => source_id,
        }
    }
}

/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
