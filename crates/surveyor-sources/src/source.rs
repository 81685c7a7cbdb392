//! The `AssetSource` trait implemented by every search source adapter.

use crate::error::Result;
use async_trait::async_trait;
use surveyor_core::{AssetRecord, Target};

/// Trait for external asset search sources.
///
/// An implementation turns one target into canonical records, walking every
/// result page. Emitted records carry `TrustLevel::Direct` and an empty
/// organization; callers stamp the organization and escalate trust.
/// Implementations must be thread-safe (Send + Sync) so one instance can
/// serve a whole query round.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Query the source for one target.
    ///
    /// # Errors
    /// Returns `SourceError::Permanent` for authentication or account
    /// failures and `SourceError::Transient` for everything else.
    async fn query(&self, target: &Target) -> Result<Vec<AssetRecord>>;

    /// Provenance tag written to each record's `source` field.
    fn source_id(&self) -> &'static str;
}
