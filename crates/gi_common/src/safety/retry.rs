//! Retry policy with exponential backoff and jitter.
//!
//! Wraps a circuit-breaker-guarded async call. An open breaker consumes an
//! attempt without touching the dependency; exhausting all attempts returns
//! the last error, which the caller routes to the fallback provider.

use crate::error::{GiError, GiResult};
use crate::safety::BreakerRegistry;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Randomize each delay by ±25 %.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter {
            capped * rand::thread_rng().gen_range(0.75..=1.25)
        } else {
            capped
        };
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()))
    }

    /// Run `op` against the named dependency, honoring its breaker.
    pub async fn run<T, F, Fut>(
        &self,
        breakers: &BreakerRegistry,
        dependency: &str,
        mut op: F,
    ) -> GiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GiResult<T>>,
    {
        let mut last_err = GiError::dependency(dependency, "no attempts made");

        for attempt in 0..self.max_retries {
            if !breakers.can_attempt(dependency) {
                // Short-circuit: counts as a failed attempt, dependency untouched.
                last_err = GiError::CircuitOpen(dependency.to_string());
            } else {
                match op().await {
                    Ok(value) => {
                        breakers.record_success(dependency);
                        return Ok(value);
                    }
                    Err(err) => {
                        breakers.record_failure(dependency);
                        warn!(
                            dependency,
                            attempt,
                            error = %err,
                            "dependency call failed"
                        );
                        if !err.is_retryable() {
                            return Err(err);
                        }
                        last_err = err;
                    }
                }
            }

            if attempt + 1 < self.max_retries {
                let delay = self.delay_for(attempt);
                debug!(dependency, attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn registry() -> BreakerRegistry {
        let r = BreakerRegistry::default();
        r.register(
            "dep",
            BreakerConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(60),
                success_threshold: 3,
            },
        );
        r
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_band() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            let d = policy.delay_for(0).as_secs_f64();
            assert!((0.75..=1.25).contains(&d), "jittered delay {} out of band", d);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(&registry(), "dep", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(GiError::dependency("dep", "timeout"))
                    } else {
                        Ok("answer")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: GiResult<()> = fast_policy()
            .run(&registry(), "dep", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GiError::dependency("dep", "down")) }
            })
            .await;
        assert!(matches!(result, Err(GiError::Dependency { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_open_breaker_short_circuits_without_calling() {
        let r = registry();
        for _ in 0..5 {
            r.record_failure("dep");
        }

        let calls = AtomicU32::new(0);
        let result: GiResult<()> = fast_policy()
            .run(&r, "dep", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(GiError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: GiResult<()> = fast_policy()
            .run(&registry(), "dep", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GiError::internal("bug")) }
            })
            .await;
        assert!(matches!(result, Err(GiError::Internal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
