//! Bounded retries with exponential backoff and full jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// Retry settings for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the backoff window after `attempt` failures (1-based).
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Full-jitter delay: uniform in `[0, backoff_ceiling(attempt)]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.jittered_delay(attempt);
                warn!(
                    label = %label,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying change-management request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_ceiling_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(250));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_millis(4_000));
    }

    #[test]
    fn test_jitter_stays_within_ceiling() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            let delay = policy.jittered_delay(attempt);
            assert!(delay <= policy.backoff_ceiling(attempt));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Status {
                        status: 503,
                        detail: "busy".into(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Status {
                    status: 403,
                    detail: "forbidden".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let result: Result<()> = retry_with_backoff(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Transport("reset".into())) }
        })
        .await;
        assert_eq!(result, Err(ApiError::Transport("reset".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
