//! Exponential backoff for transient model-service failures.

use std::future::Future;
use std::time::Duration;

use log::{error, info, warn};
use rand::Rng;
use tokio::time::sleep;

use crate::LlmError;
use crate::pkg_config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so at most `max_retries + 1` calls.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs_f64(config.base_delay_secs.max(0.0)),
            max_jitter: Duration::from_secs_f64(config.max_jitter_secs.max(0.0)),
        }
    }

    /// No sleeping between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// `base_delay * 2^attempt` plus up to `max_jitter`, where `attempt`
    /// counts from zero for the first failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..self.max_jitter.as_secs_f64()))
        };
        backoff.saturating_add(jitter)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// `on_retry` is told the 1-based number of the attempt that just failed and
/// how long the loop will sleep before the next one.
pub async fn retry_with_backoff<T, Op, Fut, OnRetry>(
    policy: &RetryPolicy,
    mut on_retry: OnRetry,
    mut operation: Op,
) -> Result<T, LlmError>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
    OnRetry: FnMut(u32, Duration),
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    info!("Request succeeded on attempt {}", attempt + 1);
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {} failed with retryable error, retrying in {:.1}s: {}",
                    attempt + 1,
                    delay.as_secs_f64(),
                    err
                );
                on_retry(attempt + 1, delay);
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    error!("All {} attempts failed: {}", attempt + 1, err);
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttled() -> LlmError {
        LlmError::Throttled {
            code: "ServiceUnavailableException".into(),
            message: "busy".into(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_two_busy_responses() {
        let mut calls = 0;
        let mut notices = Vec::new();
        let result = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |failed, _| notices.push(failed),
            |_| {
                calls += 1;
                let n = calls;
                async move {
                    if n <= 2 {
                        Err(throttled())
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
        assert_eq!(notices, vec![1, 2]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |_, _| {},
            |_| {
                calls += 1;
                async { Err(throttled()) }
            },
        )
        .await;

        assert!(matches!(result, Err(LlmError::Throttled { .. })));
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |_, _| panic!("no retry expected"),
            |_| {
                calls += 1;
                async { Err(LlmError::InvalidRequest("bad body".into())) }
            },
        )
        .await;

        assert!(matches!(result, Err(LlmError::InvalidRequest(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_below_bound() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let delay = policy.delay_for(attempt);
            let floor = Duration::from_secs(2 << attempt);
            assert!(delay >= floor);
            assert!(delay < floor + Duration::from_secs(1));
        }
    }
}
