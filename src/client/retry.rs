//! # Reconnect Policy
//!
//! The retry behavior of the host client, pulled out of the network loop so
//! it can be unit-tested against a counter instead of a real socket.
//!
//! The baseline policy is deliberately dumb: a fixed delay, retried forever.
//! The device may be rebooting, the WiFi may be down for an hour; the host's
//! job is to be there when it comes back.

use std::time::Duration;

/// Decides whether and how long to wait before the next connection attempt.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay between attempts
    delay: Duration,
    /// Optional attempt cap; `None` retries forever (the baseline)
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay policy with no attempt cap.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Fixed-delay policy that gives up after `max_attempts` consecutive
    /// failures. The counter resets on every successful connection.
    #[must_use]
    pub fn capped(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    /// Backoff before attempt number `attempt` (1-based count of consecutive
    /// failures), or `None` if the policy says to give up.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Tracks consecutive connection failures against a policy.
#[derive(Debug, Clone, Copy)]
pub struct AttemptCounter {
    policy: ReconnectPolicy,
    failures: u32,
}

impl AttemptCounter {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failed attempt; returns the backoff to apply, or `None` if
    /// the policy is exhausted.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        self.policy.backoff(self.failures)
    }

    /// Record a successful connection; consecutive-failure count restarts.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}
