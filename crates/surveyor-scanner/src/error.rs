use surveyor_db::DatabaseError;
use surveyor_sources::SourceError;
use thiserror::Error;

/// Errors raised by the query rounds and the pipeline.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Nothing to run: no enabled source or no target
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An export sink failed to write a stage
    #[error("Export of {stage} failed: {message}")]
    Export {
        /// Stage or report name
        stage: String,
        /// Error message
        message: String,
    },

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Source failure
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
