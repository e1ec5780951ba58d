//! Exponential backoff for transient delivery failures.
//!
//! Used by the Telegram notifier: 429 responses, 5xx responses and
//! connection problems are retried, everything else fails fast.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, VigilError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0)`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        // powi beyond 2^20 buys nothing once capped by max_delay
        let exponent = attempt.min(20) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let millis = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..1.0)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }
}

/// Whether an error is worth another attempt.
pub fn is_transient(error: &VigilError) -> bool {
    match error {
        VigilError::Timeout(_) | VigilError::RateLimited(_) => true,
        VigilError::HttpError(e) => {
            e.is_connect()
                || e.is_timeout()
                || e
                    .status()
                    .is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
        }
        VigilError::NotificationFailed(msg) => msg.contains("status 5"),
        _ => false,
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up. A server-provided wait (`retry_after`) takes
/// precedence over the computed backoff.
pub async fn retry_with<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, (VigilError, Option<Duration>)>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err((error, retry_after)) => {
                if !is_transient(&error) {
                    if attempt > 0 {
                        warn!(attempts = attempt + 1, error = %error, "Permanent error after retries");
                    }
                    return Err(error);
                }
                let remaining = policy.max_attempts.saturating_sub(attempt + 1);
                if remaining == 0 {
                    if attempt == 0 {
                        return Err(error);
                    }
                    warn!(attempts = attempt + 1, error = %error, "Giving up after retries");
                    return Err(VigilError::RetryExhausted {
                        attempts: attempt + 1,
                        last_error: error.to_string(),
                    });
                }

                let delay = retry_after
                    .map(|d| d.min(policy.max_delay))
                    .unwrap_or_else(|| policy.delay_for_attempt(attempt));
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
