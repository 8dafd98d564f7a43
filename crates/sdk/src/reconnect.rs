//! Reconnect policy: fixed delay, unlimited attempts by default.

use std::time::Duration;

/// Controls how the connection manager reconnects after a socket drop.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Reconnect at all after the socket closes.
    pub enabled: bool,
    /// Wait before each attempt. Does not grow.
    pub delay: Duration,
    /// Maximum number of consecutive failed attempts before giving up.
    /// `0` means unlimited retries.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Duration::from_secs(3),
            max_attempts: 0, // unlimited
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Whether the given attempt number (1-indexed) exceeds the max.
    pub fn should_give_up(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt > self.max_attempts
    }
}
