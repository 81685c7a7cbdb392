//! Surveyor Search Sources
//!
//! Adapters for the external asset search engines and the retry controller
//! that wraps a single adapter call.
//!
//! # Sources
//!
//! - **Quake**: 360 Quake scroll API, cursor pagination via `pagination_id`
//! - **FOFA**: `search/all` endpoint, base64 query, numbered pages
//! - **Hunter**: Qianxin Hunter `openApi/search`, URL-safe base64 query
//!
//! Every adapter implements [`AssetSource`] and emits canonical
//! `surveyor_core::AssetRecord`s with a normalized URL.
//!
//! # Example
//!
//! ```ignore
//! use surveyor_sources::{query_with_retry, FofaProvider, RetryPolicy};
//!
//! let fofa = FofaProvider::new(api_key)?;
//! let records = query_with_retry(&fofa, &target, &RetryPolicy::default()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod normalize;
pub mod providers;
pub mod retry;
pub mod source;

// Re-export commonly used types
pub use error::{Result, SourceError};
pub use providers::{enabled_sources, FofaProvider, HunterProvider, QuakeProvider};
pub use retry::{is_retryable, query_with_retry, RetryPolicy};
pub use source::AssetSource;
