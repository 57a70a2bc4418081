//! Retry with exponential backoff for addon requests
//!
//! Delay schedule comes from `backon`; a uniform jitter in `[0, jitter)` is
//! added on top of each delay.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use crumble_addons::AddonClientError;
use rand::RngExt;

use crate::config::RetryConfig;

/// Retry policy for one addon operation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f32,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            factor: config.factor,
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// Policy that makes a single attempt
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff delays before attempts 2..=`max_attempts`, without jitter:
    /// `min(initial * factor^n, max)` for n = 0, 1, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .build()
    }

    fn jitter(&self) -> Duration {
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is exhausted. The last error is returned.
    pub async fn retry<T, F, Fut>(&self, mut operation: F) -> Result<T, AddonClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AddonClientError>>,
    {
        let mut last_err = None;
        for (attempt, delay) in std::iter::once(Duration::ZERO)
            .chain(self.delays())
            .enumerate()
        {
            if attempt > 0 {
                let delay = delay + self.jitter();
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying addon request"
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Addon request failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AddonClientError::Network("Retry exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            factor: 2.0,
            jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_delays_are_capped() {
        let delays: Vec<_> = policy(6).delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
                Duration::from_millis(10_000),
            ]
        );
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        assert_eq!(policy(1).delays().count(), 0);
    }

    #[test]
    fn test_jitter_bounds() {
        let mut p = policy(2);
        p.jitter = Duration::from_millis(200);
        for _ in 0..100 {
            assert!(p.jitter() < Duration::from_millis(200));
        }
        assert_eq!(policy(2).jitter(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(4)
            .retry(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AddonClientError::Unauthorized {
                    url: "http://localhost/catalog/movie/x.json".to_string(),
                })
            })
            .await;

        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
