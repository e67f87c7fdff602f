//! Reconnect scheduling.
//!
//! The manager asks a [`RetryPolicy`] how long to wait after every lost or
//! failed session. The default [`FixedDelay`] reconnects forever; stricter
//! deployments can swap in [`ExponentialBackoff`] without touching the state
//! machine.

use std::time::Duration;

/// Decides the pause before the next connection attempt.
#[cfg_attr(test, mockall::automock)]
pub trait RetryPolicy: Send + Sync {
    /// `attempt` counts consecutive failed or closed sessions since the last
    /// successful connect, starting at 1. `None` stops the manager.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay every time, never gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(self.0)
    }
}

/// Doubling delay capped at `max`, with an optional attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    /// Acts as a circuit breaker once exceeded.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|limit| attempt > limit) {
            return None;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max);
        Some(delay)
    }
}
