//! Retry controller wrapping a single adapter call.
//!
//! Only rate-limit and quota failures are retried, identified by the phrases
//! the live services put in their error messages. Permanent errors and
//! anything unrecognised surface immediately.

use crate::error::{Result, SourceError};
use crate::source::AssetSource;
use std::time::Duration;
use surveyor_core::{AssetRecord, Target};

/// Maximum number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Base delay; retry `n` waits `n * RETRY_DELAY`.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Lower-cased phrases marking a rate-limit or quota failure.
pub const RATE_LIMIT_PHRASES: [&str; 10] = [
    "请求太多",
    "稍后再试",
    "rate limit",
    "too many requests",
    "quota exceeded",
    "api limit",
    "请求频率过高",
    "请求过于频繁",
    "请求超限",
    "请求限制",
];

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay unit; retry `n` waits `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

/// Whether an error is worth retrying.
#[must_use]
pub fn is_retryable(error: &SourceError) -> bool {
    match error {
        SourceError::Permanent { .. } | SourceError::RetriesExhausted { .. } => false,
        SourceError::Transient { .. } => {
            let message = error.to_string().to_lowercase();
            RATE_LIMIT_PHRASES
                .iter()
                .any(|phrase| message.contains(phrase))
        }
    }
}

/// Query one source for one target, retrying rate-limit failures.
///
/// # Errors
/// Returns the first non-retryable error unchanged, or
/// `SourceError::RetriesExhausted` wrapping the last error once every retry
/// has failed.
pub async fn query_with_retry(
    source: &dyn AssetSource,
    target: &Target,
    policy: &RetryPolicy,
) -> Result<Vec<AssetRecord>> {
    let mut retry = 0;

    loop {
        let error = match source.query(target).await {
            Ok(records) => {
                if retry > 0 {
                    tracing::info!(
                        source = source.source_id(),
                        target = %target.host,
                        "Query succeeded after {} retries",
                        retry
                    );
                }
                return Ok(records);
            }
            Err(e) => e,
        };

        if !is_retryable(&error) {
            tracing::warn!(source = source.source_id(), target = %target.host, "Not retrying: {}", error);
            return Err(error);
        }

        if retry >= policy.max_retries {
            return Err(SourceError::RetriesExhausted {
                source_id: source.source_id().to_string(),
                attempts: retry + 1,
                cause: Box::new(error),
            });
        }

        retry += 1;
        let delay = policy.delay_for(retry);
        tracing::warn!(
            source = source.source_id(),
            target = %target.host,
            "Rate limited (retry {}/{}), waiting {:?}: {}",
            retry,
            policy.max_retries,
            delay,
            error
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted outcomes, one per call.
    struct ScriptedSource {
        outcomes: Mutex<VecDeque<Result<Vec<AssetRecord>>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<Result<Vec<AssetRecord>>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("lock calls")
        }
    }

    #[async_trait]
    impl AssetSource for ScriptedSource {
        async fn query(&self, _target: &Target) -> Result<Vec<AssetRecord>> {
            *self.calls.lock().expect("lock calls") += 1;
            self.outcomes
                .lock()
                .expect("lock outcomes")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn source_id(&self) -> &'static str {
            "scripted"
        }
    }

    fn rate_limited() -> Result<Vec<AssetRecord>> {
        Err(SourceError::transient("scripted", "Rate Limit reached"))
    }

    fn target() -> Target {
        Target::new("Example", "example.com")
    }

    #[test]
    fn test_classification() {
        assert!(is_retryable(&SourceError::transient("fofa", "Too Many Requests")));
        assert!(is_retryable(&SourceError::transient("hunter", "请求太多啦，稍后再试试")));
        assert!(is_retryable(&SourceError::transient("quake", "API LIMIT hit")));
        assert!(!is_retryable(&SourceError::transient("quake", "connection reset")));
        assert!(!is_retryable(&SourceError::permanent("fofa", "rate limit on invalid key")));
    }

    #[test]
    fn test_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2), Duration::from_secs(6));
        assert_eq!(policy.delay_for(3), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_exhausts() {
        let source = ScriptedSource::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
        ]);
        let start = Instant::now();

        let result = query_with_retry(&source, &target(), &RetryPolicy::default()).await;

        match result {
            Err(SourceError::RetriesExhausted { attempts, cause, .. }) => {
                assert_eq!(attempts, 4);
                assert!(cause.to_string().contains("Rate Limit"));
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(source.calls(), 4);
        // 3s + 6s + 9s
        assert_eq!(start.elapsed().as_secs(), 18);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_retry() {
        let record = AssetRecord {
            url: "http://example.com".to_string(),
            ..AssetRecord::default()
        };
        let source = ScriptedSource::new(vec![rate_limited(), Ok(vec![record.clone()])]);
        let start = Instant::now();

        let records = query_with_retry(&source, &target(), &RetryPolicy::default())
            .await
            .expect("query succeeds");

        assert_eq!(records, vec![record]);
        assert_eq!(source.calls(), 2);
        assert_eq!(start.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_and_unmatched_are_not_retried() {
        let source = ScriptedSource::new(vec![Err(SourceError::permanent("scripted", "bad key"))]);
        let start = Instant::now();
        let result = query_with_retry(&source, &target(), &RetryPolicy::default()).await;
        assert!(matches!(result, Err(SourceError::Permanent { .. })));
        assert_eq!(source.calls(), 1);

        let source = ScriptedSource::new(vec![Err(SourceError::transient("scripted", "HTTP 502"))]);
        let result = query_with_retry(&source, &target(), &RetryPolicy::default()).await;
        assert!(matches!(result, Err(SourceError::Transient { .. })));
        assert_eq!(source.calls(), 1);

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
