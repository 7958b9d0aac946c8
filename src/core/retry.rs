//! Bounded attempts for idempotent vendor calls
//!
//! Used for topic and subscription provisioning, where repeating the call
//! is harmless and a short, growing pause rides out a broker restart.
//! Message and payload redelivery never go through here; they follow the
//! dequeue / max-retry rules of the consume and produce paths.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Pause after the first failure; attempt `n` waits `n × delay`
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    fn pause_after(&self, attempt: usize) -> Duration {
        self.delay.saturating_mul(attempt as u32)
    }
}

/// Run `operation` until it succeeds or the policy runs out of attempts.
/// The last error is returned as is.
pub async fn retry_async<F, Fut, T, E>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= policy.max_attempts {
            return Err(error);
        }

        let pause = policy.pause_after(attempt);
        log::debug!(
            "{} failed ({}/{}), next attempt in {:?}: {}",
            operation_name,
            attempt,
            policy.max_attempts,
            pause,
            error
        );
        tokio::time::sleep(pause).await;
        attempt += 1;
    }
}
