use std::time::Duration;

/// Capped exponential delay policy for reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    initial_delay_ms: u64,
    max_delay_ms: u64,
}

impl ReconnectPolicy {
    /// Create a policy; `initial_delay_ms` is clamped to at least 1.
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        let initial = initial_delay_ms.max(1);
        Self {
            initial_delay_ms: initial,
            max_delay_ms: max_delay_ms.max(initial),
        }
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay before the given retry attempt (0-based).
    ///
    /// Doubles per attempt and never exceeds the configured maximum, so the
    /// sequence of delays is non-decreasing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let scaled = self.initial_delay_ms.saturating_mul(1_u64 << shift);
        Duration::from_millis(scaled.min(self.max_delay_ms))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(500, 30_000)
    }
}

/// Stateful backoff used by a session run loop.
///
/// Reset after every successful open so a later drop starts over from the
/// initial delay.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay for the next retry; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Forget accumulated attempts after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
