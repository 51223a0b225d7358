use crate::error::ErrorCategory;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration. The enrichment retry path (SPEC_FULL.md §4.5) uses
/// `RetryConfig::default()`: 3 attempts, 100/200/400ms exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn rate_limited() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 1.5,
            jitter: 0.3,
        }
    }
}

/// Chooses a `RetryConfig` based on the error's category.
#[derive(Clone)]
pub struct RetryPolicy {
    default_config: RetryConfig,
    rate_limited_config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_config: RetryConfig::default(),
            rate_limited_config: RetryConfig::rate_limited(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn config_for_error(&self, error: &Error) -> Option<&RetryConfig> {
        match error.category() {
            ErrorCategory::Permanent | ErrorCategory::CircuitBreaker => None,
            ErrorCategory::RateLimited => Some(&self.rate_limited_config),
            ErrorCategory::Transient => Some(&self.default_config),
        }
    }
}

/// Executes `operation`, retrying per `policy` until success, a non-retryable
/// error, or `max_attempts` is reached.
pub async fn retry_with_policy<T, F, Fut>(operation: F, policy: &RetryPolicy, operation_name: &str) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        debug!("executing '{operation_name}' (attempt {attempt})");
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("'{operation_name}' succeeded after {attempt} attempts");
                }
                return Ok(value);
            }
            Err(error) => {
                let Some(config) = policy.config_for_error(&error) else {
                    debug!("'{operation_name}' failed with non-retryable error: {error}");
                    return Err(error);
                };
                if attempt >= config.max_attempts {
                    warn!("'{operation_name}' failed after {attempt} attempts: {error}");
                    return Err(error);
                }
                let delay = calculate_delay(attempt - 1, config, &error);
                debug!("'{operation_name}' failed (attempt {attempt}), retrying after {delay:?}: {error}");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

pub async fn retry<T, F, Fut>(operation: F, operation_name: &str) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_policy(operation, &RetryPolicy::default(), operation_name).await
}

fn calculate_delay(attempt: u32, config: &RetryConfig, error: &Error) -> Duration {
    if let Some(retry_after) = error.retry_after() {
        return retry_after.min(config.max_delay);
    }
    let base_ms = config.initial_delay.as_millis() as f64;
    let exp_ms = base_ms * config.multiplier.powi(attempt as i32);
    let capped_ms = exp_ms.min(config.max_delay.as_millis() as f64);
    add_jitter(Duration::from_millis(capped_ms as u64), config.jitter)
}

fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    delay + Duration::from_millis(rng.gen_range(0..=jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn transient(msg: &str) -> Error {
        Error::ServiceUnavailable { provider: "test".to_string(), message: msg.to_string() }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_delay() {
        let result = retry(|| async { Ok::<u32, Error>(42) }, "op").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result = retry(
            move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(transient("temporary"))
                    } else {
                        Ok(42u32)
                    }
                }
            },
            "op",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result = retry(
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<u32, Error>(Error::InvalidInput { field: "x".into(), reason: "bad".into() }) }
            },
            "op",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_at_three_attempts_by_default() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result = retry(
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<u32, Error>(transient("always fails")) }
            },
            "op",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn jitter_only_adds_delay() {
        let delay = StdDuration::from_millis(1000);
        let jittered = add_jitter(delay, 0.1);
        assert!(jittered >= delay);
        assert!(jittered <= delay + StdDuration::from_millis(100));
    }
}
