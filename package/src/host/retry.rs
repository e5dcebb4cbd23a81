//! Exponential backoff with full jitter for retrying host requests.

use std::time::Duration;

use rand::Rng;

/// Retry policy for a single logical host operation.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub total_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            factor: 2.0,
            max_delay: Duration::from_secs(5),
            total_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// The delay before attempt `attempt` (0-indexed: `attempt == 0` is the
    /// first retry after the initial try), with full jitter applied.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jittered = rand::thread_rng().gen_range(0.0..=capped);
        Duration::from_secs_f64(jittered)
    }

    /// Run `op` up to `max_attempts` times, retrying while `should_retry`
    /// returns `true` for the error, honoring `total_timeout` as a ceiling
    /// across every attempt and the delays between them.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        should_retry: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let deadline = tokio::time::Instant::now() + self.total_timeout;
        let mut attempt = 0;
        loop {
            let result = op().await;
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt - 1);
                    if tokio::time::Instant::now() + delay >= deadline {
                        return Err(err);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_retrying_when_should_retry_false() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("permanent")
                },
                |_| false,
            )
            .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("always fails")
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
