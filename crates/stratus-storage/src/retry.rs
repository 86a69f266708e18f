//! Retry budget and backoff.
//!
//! Retries are bounded by wall-clock time, not attempt count: a transient
//! failure is retried until the ceiling for its category has elapsed since the
//! operation began. Delays grow exponentially up to a cap, with up to 10%
//! jitter, and are clamped to the remaining budget.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use stratus_core::{StorageConfig, StorageError, StorageResult, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub(crate) fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before retry number `attempt` (zero-based), without jitter.
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        let jitter_ms = u64::try_from(base.as_millis() / 10).unwrap_or(0);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// Retry budget captured when an operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) ceiling: Duration,
    pub(crate) backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` once the budget is spent.
    pub(crate) fn next_delay(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        if elapsed >= self.ceiling {
            return None;
        }
        Some(
            self.backoff
                .delay_with_jitter(attempt)
                .min(self.ceiling - elapsed),
        )
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run a single-shot operation under `policy`, retrying transient failures.
pub(crate) async fn retry_operation<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    target: &str,
    mut attempt_fn: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => {
                tracing::warn!(
                    operation = operation,
                    target = %target,
                    error = %err,
                    "Storage operation failed with non-transient error"
                );
                return Err(StorageError::Transfer(err));
            }
            Err(err) => {
                let elapsed = started.elapsed();
                match policy.next_delay(attempt, elapsed) {
                    Some(delay) => {
                        tracing::warn!(
                            operation = operation,
                            target = %target,
                            attempt = attempt + 1,
                            delay_ms = millis(delay),
                            error = %err,
                            "Storage operation failed, retrying"
                        );
                        attempt += 1;
                        sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            operation = operation,
                            target = %target,
                            attempts = attempt + 1,
                            elapsed_ms = millis(elapsed),
                            error = %err,
                            "Storage operation retry budget exhausted"
                        );
                        return Err(StorageError::RetryLimitExceeded {
                            elapsed_ms: millis(elapsed),
                            source: err,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(ceiling_ms: u64) -> RetryPolicy {
        RetryPolicy {
            ceiling: Duration::from_millis(ceiling_ms),
            backoff: BackoffPolicy::new(
                Duration::from_millis(1_000),
                Duration::from_millis(8_000),
            ),
        }
    }

    #[test]
    fn backoff_exponential_then_capped() {
        let backoff = BackoffPolicy::new(
            Duration::from_millis(1_000),
            Duration::from_millis(8_000),
        );
        assert_eq!(backoff.delay(0), Duration::from_millis(1_000));
        assert_eq!(backoff.delay(1), Duration::from_millis(2_000));
        assert_eq!(backoff.delay(2), Duration::from_millis(4_000));
        assert_eq!(backoff.delay(3), Duration::from_millis(8_000));
        assert_eq!(backoff.delay(4), Duration::from_millis(8_000));
        assert_eq!(backoff.delay(40), Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let backoff = BackoffPolicy::new(
            Duration::from_millis(1_000),
            Duration::from_millis(8_000),
        );
        for _ in 0..100 {
            let delay = backoff.delay_with_jitter(1);
            assert!(delay >= Duration::from_millis(2_000));
            assert!(delay <= Duration::from_millis(2_200));
        }
    }

    #[test]
    fn next_delay_clamped_to_budget() {
        let budget = policy(1_500);
        assert_eq!(
            budget.next_delay(3, Duration::from_millis(1_000)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(budget.next_delay(0, Duration::from_millis(1_500)), None);
        assert_eq!(policy(0).next_delay(0, Duration::ZERO), None);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_operation(&policy(60_000), "get_metadata", "gs://b/o", || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(TransferError::transient("unavailable"))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_budget_is_spent() {
        let calls = AtomicU32::new(0);
        let result: StorageResult<()> =
            retry_operation(&policy(5_000), "delete", "gs://b/o", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransferError::transient("unavailable")) }
            })
            .await;
        match result {
            Err(StorageError::RetryLimitExceeded { elapsed_ms, source }) => {
                assert!(elapsed_ms >= 5_000);
                assert_eq!(source.message(), "unavailable");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: StorageResult<()> =
            retry_operation(&policy(60_000), "delete", "gs://b/o", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransferError::from_status(404, "not found")) }
            })
            .await;
        assert!(matches!(result, Err(StorageError::Transfer(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
