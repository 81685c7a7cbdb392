//! Core error types for Surveyor.
//!
//! Subsystem crates define their own error enums; this module carries the
//! errors raised by the shared model, configuration and target validation.

use thiserror::Error;

/// Central error type for core operations.
#[derive(Error, Debug)]
pub enum SurveyorError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A target host that is not a public IPv4 address, public CIDR or domain
    #[error("invalid target '{host}': {reason}")]
    InvalidTarget {
        /// Offending host as read from input
        host: String,
        /// Why it was rejected
        reason: String,
    },

    /// Target list could not be read
    #[error("target input error: {0}")]
    TargetInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SurveyorError`.
pub type Result<T> = std::result::Result<T, SurveyorError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SurveyorError::InvalidTarget {
            host: "10.0.0.1".to_string(),
            reason: "private address".to_string(),
        };
        assert_eq!(err.to_string(), "invalid target '10.0.0.1': private address");

        let err = ConfigError::NotFound {
            path: "config.toml".to_string(),
        };
        assert_eq!(err.to_string(), "config file not found at config.toml");
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::InvalidValue {
            field: "query.interval_seconds".to_string(),
            reason: "must not be negative".to_string(),
        };
        let err: SurveyorError = config_err.into();
        assert!(matches!(err, SurveyorError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: SurveyorError = io_err.into();
        assert!(matches!(err, SurveyorError::Io(_)));
    }
}
