//! HTTP retry policy with linearly growing delays.

use std::time::Duration;

use ih_domain::error::Error;

/// Controls how the dispatcher repeats a failed request.
///
/// After the `n`-th failure (1-indexed) the dispatcher waits
/// `base_delay * n` and sends the identical request again, up to
/// `max_retries` extra attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Retry 4xx responses too. They will rarely succeed on a second try,
    /// but this is the historical SDK behavior, so it is on by default.
    pub retry_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            retry_client_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether a request that has already failed `failures` times should
    /// be sent again after failing with `err`.
    pub fn should_retry(&self, failures: u32, err: &Error) -> bool {
        if failures > self.max_retries {
            return false;
        }
        self.retry_client_errors || !err.is_client_error()
    }
}
