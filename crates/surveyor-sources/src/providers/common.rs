//! Common utilities shared across source adapters.

use crate::error::{Result, SourceError};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Hard ceiling on pages fetched for one target.
pub const MAX_PAGES: u32 = 100;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a standard HTTP client with the given timeout.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(source_id: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::permanent(source_id, format!("failed to create HTTP client: {e}")))
}

/// Classify a transport-level failure.
#[must_use]
pub fn transport_error(source_id: &str, error: &reqwest::Error) -> SourceError {
    SourceError::transient(source_id, format!("http request failed: {error}"))
}

/// Check the HTTP status and parse the body as JSON.
///
/// 401 and 403 are permanent, 429 is reported as "too many requests" so the
/// retry controller picks it up, every other failure is transient.
pub async fn read_json(source_id: &str, response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SourceError::permanent(source_id, format!("HTTP {status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                SourceError::transient(source_id, format!("too many requests (HTTP {status}): {body}"))
            }
            _ => SourceError::transient(source_id, format!("HTTP {status}: {body}")),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| SourceError::transient(source_id, format!("read response failed: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| SourceError::transient(source_id, format!("json unmarshal failed: {e}")))
}
