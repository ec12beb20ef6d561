use std::{fmt::Display, future::Future, time::Duration};

use tracing::warn;

/// Bounded exponential backoff: `base_delay * factor^attempt`, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay_ms: 100, backoff_factor: 2, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay_ms: u64, backoff_factor: u32) -> Self {
        Self { attempts, base_delay_ms, backoff_factor, ..Self::default() }
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = u64::from(self.backoff_factor.max(1)).saturating_pow(exponent);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Runs `operation` until it succeeds or the attempts are used up, returning the
    /// last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt + 1 >= attempts {
                        warn!(
                            event_name = "retry.exhausted",
                            operation = label,
                            attempts,
                            error = %error,
                            "retry attempts exhausted"
                        );
                        return Err(error);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        event_name = "retry.scheduled",
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed; retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
