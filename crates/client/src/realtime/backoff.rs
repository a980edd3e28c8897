//! Reconnect delays of the realtime channel.

use std::time::Duration;

use crate::config::RealtimeConfig;

/// Bounded exponential backoff: `min(base * 2^attempt, max_delay)`, for at
/// most `max_attempts` automatic attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ReconnectPolicy {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another automatic attempt is allowed after `attempt` retries.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_schedule() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..policy.max_attempts)
            .map(|n| policy.delay_for_attempt(n).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert!(!policy.allows(5));
    }

    #[test]
    fn delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_secs(30));
    }

    proptest! {
        #[test]
        fn delays_never_decrease_and_never_exceed_cap(n in 0u32..200) {
            let policy = ReconnectPolicy::default();
            let this = policy.delay_for_attempt(n);
            let next = policy.delay_for_attempt(n + 1);
            prop_assert!(this <= next);
            prop_assert!(next <= policy.max_delay);
        }
    }
}
