//! Surveyor Core - Foundation crate for the Surveyor asset aggregator.
//!
//! This crate provides the canonical asset record and its merge rules, target
//! types, configuration management and target validation that all other
//! Surveyor crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with env overrides and bootstrap
//! - [`record`] - Canonical `AssetRecord`, URL normalization and merge rules
//! - [`types`] - Shared types (`Target`, `HostKind`, `SourceKind`)
//! - [`validation`] - Public-host checks applied to loaded targets
//!
//! # Example
//!
//! ```rust
//! use surveyor_core::{AssetRecord, TrustLevel};
//!
//! let stored = AssetRecord {
//!     url: "http://example.com".to_string(),
//!     source: "quake".to_string(),
//!     ..AssetRecord::default()
//! };
//! let incoming = AssetRecord {
//!     url: "http://example.com".to_string(),
//!     source: "fofa".to_string(),
//!     trust_level: TrustLevel::NewIp,
//!     ..AssetRecord::default()
//! };
//!
//! let merged = stored.merged_with(&incoming);
//! assert_eq!(merged.source, "fofa;quake");
//! assert_eq!(merged.trust_level, TrustLevel::Direct);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod record;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::{AppConfig, Bootstrap, SECOND_ROUND_DISABLED};
pub use error::{ConfigError, Result, SurveyorError};
pub use record::{merge_values, normalize_url, AssetRecord, TrustLevel};
pub use types::{is_ip_or_cidr, HostKind, SourceKind, Target};
pub use validation::filter_valid;
