//! Configuration types.

use std::time::Duration;

/// Retry policy for step executors.
///
/// Exponential backoff with uniform jitter: attempt `n` (zero-based) sleeps
/// a random duration in `[0, min(base * 2^n, max)]` before retrying.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per step (1 = no retry).
    pub max_attempts: u32,
    /// Base delay for the first retry.
    pub base_delay: Duration,
    /// Cap on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff ceiling for the given zero-based attempt number.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long to wait for an approval decision before failing the step as
    /// rejected. `None` waits indefinitely.
    pub approval_timeout: Option<Duration>,
    /// Retry policy applied to step executor calls.
    pub retry: RetryPolicy,
    /// Pause between consecutive steps (demo pacing; zero in tests).
    pub step_delay: Duration,
    /// Capacity of each per-client event broadcast channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_timeout: None,
            retry: RetryPolicy::default(),
            step_delay: Duration::ZERO,
            event_buffer: 256,
        }
    }
}

impl EngineConfig {
    /// Build a config from `CLIENTFLOW_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("CLIENTFLOW_APPROVAL_TIMEOUT_SECS") {
            config.approval_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(attempts) = env_u64("CLIENTFLOW_STEP_RETRIES") {
            config.retry.max_attempts = (attempts as u32).max(1);
        }
        if let Some(ms) = env_u64("CLIENTFLOW_STEP_DELAY_MS") {
            config.step_delay = Duration::from_millis(ms);
        }
        if let Some(cap) = env_u64("CLIENTFLOW_EVENT_BUFFER") {
            config.event_buffer = (cap as usize).max(16);
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fail_fast() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.approval_timeout.is_none());
        assert_eq!(config.step_delay, Duration::ZERO);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff_ceiling(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(200));
        // 400ms capped to 350ms
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_millis(350));
    }
}
