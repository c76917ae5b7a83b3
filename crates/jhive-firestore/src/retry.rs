//! Bounded retry for Firestore requests.
//!
//! Transient failures (network errors, 429, 5xx) are retried with
//! exponential backoff; a server-supplied Retry-After wins over the
//! computed delay. Client errors other than 429 fail immediately.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::FirestoreResult;
use crate::metrics::record_retry;

/// Retry policy: how many attempts, and how the delay between them grows.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Read delay tuning from the environment, keeping defaults elsewhere.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base) = env_u64("FIRESTORE_RETRY_BASE_MS") {
            config.base_delay_ms = base;
        }
        if let Some(max) = env_u64("FIRESTORE_RETRY_MAX_MS") {
            config.max_delay_ms = max;
        }
        config
    }

    /// Delay before the next attempt.
    ///
    /// Exponential growth capped at `max_delay_ms`, with full jitter so
    /// concurrent callers spread out instead of thundering back together.
    /// A Retry-After hint from the server overrides the computation.
    fn next_delay(&self, attempt: u32, server_hint_ms: Option<u64>) -> Duration {
        if let Some(hint) = server_hint_ms {
            return Duration::from_millis(hint);
        }

        let ceiling = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(20))
            .min(self.max_delay_ms);

        // Jitter without a rand dependency: fold the subsecond clock into
        // a fraction of the ceiling. Floored at base_delay_ms so retries
        // never fire back-to-back.
        let noise = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_millis() as u64)
            .unwrap_or(0);
        let jittered = ceiling * (noise % 1000) / 1000;

        Duration::from_millis(jittered.max(self.base_delay_ms))
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Run `op`, retrying while it fails retryably and attempts remain.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);
        let error = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= config.max_retries || !error.is_retryable() {
            return Err(error);
        }

        let delay = config.next_delay(attempt, error.retry_after_ms());
        warn!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Firestore operation failed, retrying: {}",
            error
        );
        record_retry(operation);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FirestoreError;

    #[test]
    fn defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn server_hint_wins() {
        let config = RetryConfig::default();
        assert_eq!(
            config.next_delay(0, Some(2500)),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn delay_is_capped_and_floored() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        for attempt in 0..12 {
            let delay = config.next_delay(attempt, None).as_millis() as u64;
            assert!(delay >= config.base_delay_ms);
            assert!(delay <= config.max_delay_ms);
        }
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let config = RetryConfig::default();
        let calls = std::sync::atomic::AtomicU32::new(0);

        let result: FirestoreResult<()> = with_retry(&config, "test", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(FirestoreError::not_found("jobs/missing")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
