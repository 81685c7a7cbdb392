//! Search source adapter implementations.

pub mod common;
pub mod fofa;
pub mod hunter;
pub mod quake;

pub use fofa::FofaProvider;
pub use hunter::HunterProvider;
pub use quake::QuakeProvider;

use crate::error::Result;
use crate::source::AssetSource;
use std::sync::Arc;
use std::time::Duration;
use surveyor_core::config::ApiKeys;
use surveyor_core::SourceKind;

/// Build an adapter for every source with a configured credential.
///
/// # Errors
/// Returns error if an HTTP client cannot be created.
pub fn enabled_sources(keys: &ApiKeys, timeout: Duration) -> Result<Vec<Arc<dyn AssetSource>>> {
    let mut sources: Vec<Arc<dyn AssetSource>> = Vec::new();
    for kind in keys.enabled_sources() {
        let Some(key) = keys.key_for(kind) else {
            continue;
        };
        let source: Arc<dyn AssetSource> = match kind {
            SourceKind::Quake => Arc::new(QuakeProvider::with_timeout(key, timeout)?),
            SourceKind::Fofa => Arc::new(FofaProvider::with_timeout(key, timeout)?),
            SourceKind::Hunter => Arc::new(HunterProvider::with_timeout(key, timeout)?),
        };
        tracing::info!(source = source.source_id(), "Source enabled");
        sources.push(source);
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_sources_follow_keys() {
        let keys = ApiKeys {
            fofa: "fofa-key".to_string(),
            quake: String::new(),
            hunter: "hunter-key".to_string(),
        };
        let sources = enabled_sources(&keys, Duration::from_secs(5)).expect("build sources");
        let ids: Vec<&str> = sources.iter().map(|s| s.source_id()).collect();
        assert_eq!(ids, vec!["fofa", "hunter"]);
    }

    #[test]
    fn test_no_keys_no_sources() {
        let sources =
            enabled_sources(&ApiKeys::default(), Duration::from_secs(5)).expect("build sources");
        assert!(sources.is_empty());
    }
}
