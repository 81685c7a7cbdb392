//! Configuration management for Surveyor.
//!
//! Provides TOML-based configuration with environment variable overrides and
//! first-run bootstrap of a commented default file.

use crate::error::{ConfigError, ConfigResult};
use crate::types::SourceKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `min_ips_per_cidr` value that disables density analysis and the second round.
pub const SECOND_ROUND_DISABLED: i64 = -1;

/// Default config written on first run.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Surveyor configuration

# Source credentials. Leave a key empty to disable that source.
[api_keys]
fofa = ""
quake = ""
hunter = ""

[query]
# Distinct IPs a /24 needs before it is queried again as a block; -1 skips the second round
min_ips_per_cidr = 10
# Distinct URLs on one IP before it is flagged for manual scanning
min_urls_per_ip_for_flag = 10
# Pause after each successful query, per source
interval_seconds = 3
# Per-request timeout
timeout_secs = 30

[input]
# CSV of `organization,hosts`; a hosts cell may hold several lines
target_file = "targets.csv"

[output]
# Each run writes into <base_dir>/<YYYYMMDD_HHMMSS>/
base_dir = "./results"
"#;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Source credentials
    pub api_keys: ApiKeys,
    /// Query cadence and analysis thresholds
    pub query: QueryConfig,
    /// Target input
    pub input: InputConfig,
    /// Result output
    pub output: OutputConfig,
}

/// Outcome of [`AppConfig::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// The file already existed and was left untouched
    Existing,
    /// A default file was written and needs editing before a real run
    Created,
}

impl AppConfig {
    /// Load configuration from `path`.
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable or not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SURVEYOR_FOFA_KEY`, `SURVEYOR_QUAKE_KEY`, `SURVEYOR_HUNTER_KEY`: source credentials
    /// - `SURVEYOR_INTERVAL_SECONDS`: pause between queries
    pub fn load_with_env(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SURVEYOR_FOFA_KEY") {
            self.api_keys.fofa = val;
            tracing::debug!("Override api_keys.fofa from env");
        }

        if let Ok(val) = std::env::var("SURVEYOR_QUAKE_KEY") {
            self.api_keys.quake = val;
            tracing::debug!("Override api_keys.quake from env");
        }

        if let Ok(val) = std::env::var("SURVEYOR_HUNTER_KEY") {
            self.api_keys.hunter = val;
            tracing::debug!("Override api_keys.hunter from env");
        }

        if let Ok(val) = std::env::var("SURVEYOR_INTERVAL_SECONDS") {
            if let Ok(seconds) = val.parse() {
                self.query.interval_seconds = seconds;
                tracing::debug!("Override query.interval_seconds from env: {}", seconds);
            }
        }
    }

    /// Write the commented default configuration to `path` unless a file is
    /// already there.
    pub fn bootstrap(path: impl AsRef<Path>) -> ConfigResult<Bootstrap> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(Bootstrap::Existing);
        }

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        tracing::info!("Wrote default config to {}", path.display());
        Ok(Bootstrap::Created)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.query.min_ips_per_cidr < SECOND_ROUND_DISABLED {
            return Err(ConfigError::InvalidValue {
                field: "query.min_ips_per_cidr".to_string(),
                reason: format!(
                    "must be {SECOND_ROUND_DISABLED} (disabled) or a non-negative count, got {}",
                    self.query.min_ips_per_cidr
                ),
            });
        }
        if self.query.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-source API credentials. An empty key disables the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// FOFA API key
    pub fofa: String,
    /// Quake API token
    pub quake: String,
    /// Hunter API key
    pub hunter: String,
}

impl ApiKeys {
    /// Credential for one source, if configured.
    #[must_use]
    pub fn key_for(&self, source: SourceKind) -> Option<&str> {
        let key = match source {
            SourceKind::Quake => &self.quake,
            SourceKind::Fofa => &self.fofa,
            SourceKind::Hunter => &self.hunter,
        };
        let key = key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Sources with a configured credential, in query order.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|source| self.key_for(*source).is_some())
            .collect()
    }
}

/// Query cadence and analysis thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Distinct IPs a /24 needs to be expanded; [`SECOND_ROUND_DISABLED`] skips it
    pub min_ips_per_cidr: i64,
    /// Distinct URLs on one IP before it is flagged
    pub min_urls_per_ip_for_flag: u32,
    /// Pause after each successful query, per source
    pub interval_seconds: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_ips_per_cidr: 10,
            min_urls_per_ip_for_flag: 10,
            interval_seconds: 3,
            timeout_secs: 30,
        }
    }
}

impl QueryConfig {
    /// Density threshold, or `None` when the second round is disabled.
    #[must_use]
    pub fn density_threshold(&self) -> Option<usize> {
        usize::try_from(self.min_ips_per_cidr).ok()
    }

    /// Pause between successive queries to one source.
    #[must_use]
    pub fn query_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Target input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path of the target CSV
    pub target_file: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            target_file: PathBuf::from("targets.csv"),
        }
    }
}

/// Result output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives one sub-directory per run
    pub base_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.query.min_ips_per_cidr, 10);
        assert_eq!(config.query.min_urls_per_ip_for_flag, 10);
        assert_eq!(config.query.interval_seconds, 3);
        assert_eq!(config.query.timeout_secs, 30);
        assert!(config.api_keys.enabled_sources().is_empty());
        assert_eq!(config.input.target_file, PathBuf::from("targets.csv"));
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG_TEMPLATE).expect("parse template");
        let defaults = AppConfig::default();
        assert_eq!(config.query.min_ips_per_cidr, defaults.query.min_ips_per_cidr);
        assert_eq!(config.output.base_dir, defaults.output.base_dir);
        assert!(config.api_keys.enabled_sources().is_empty());
    }

    #[test]
    fn test_bootstrap_creates_once() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");

        assert_eq!(AppConfig::bootstrap(&path).expect("bootstrap"), Bootstrap::Created);
        assert_eq!(AppConfig::bootstrap(&path).expect("bootstrap"), Bootstrap::Existing);

        let loaded = AppConfig::load(&path).expect("load bootstrapped config");
        assert_eq!(loaded.query.interval_seconds, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load(tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_disabled_second_round() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[api_keys]\nfofa = \"fofa-key\"\n\n[query]\nmin_ips_per_cidr = -1\n",
        )
        .expect("write config");

        let loaded = AppConfig::load(&path).expect("load config");
        assert_eq!(loaded.api_keys.fofa, "fofa-key");
        assert_eq!(loaded.query.density_threshold(), None);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[api_keys]
hunter = "  hunter-key "

[query]
min_ips_per_cidr = 4
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.api_keys.enabled_sources(), vec![SourceKind::Hunter]);
        assert_eq!(config.api_keys.key_for(SourceKind::Hunter), Some("hunter-key"));
        assert_eq!(config.query.density_threshold(), Some(4));
        // These should be defaults
        assert_eq!(config.query.min_urls_per_ip_for_flag, 10);
        assert_eq!(config.query.query_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_enabled_sources_order() {
        let keys = ApiKeys {
            fofa: "f".to_string(),
            quake: "q".to_string(),
            hunter: String::new(),
        };
        assert_eq!(
            keys.enabled_sources(),
            vec![SourceKind::Quake, SourceKind::Fofa]
        );
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.query.min_ips_per_cidr = -5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.query.min_ips_per_cidr = 0;
        config.query.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SURVEYOR_QUAKE_KEY", "env-quake");
        std::env::set_var("SURVEYOR_INTERVAL_SECONDS", "7");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.api_keys.quake, "env-quake");
        assert_eq!(config.query.interval_seconds, 7);

        std::env::remove_var("SURVEYOR_QUAKE_KEY");
        std::env::remove_var("SURVEYOR_INTERVAL_SECONDS");
    }
}
