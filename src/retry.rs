//! Reusable retry policy for outbound network calls.
//!
//! Every outbound call that is retried at all is retried through this one
//! policy: a fixed attempt count with exponential backoff and a delay cap.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds or attempts are exhausted,
    /// sleeping the backoff between attempts. Non-retryable errors short
    /// circuit. Returns the last error on exhaustion.
    pub async fn run<F, Fut, T>(&self, context: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.attempts && e.is_retryable() => {
                    warn!(context, attempt, error = %e, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64(
                        (delay.as_secs_f64() * self.multiplier)
                            .min(self.max_delay.as_secs_f64()),
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(context, attempt, error = %e, "operation failed");
                    return Err(e);
                }
            }
        }
    }
}
