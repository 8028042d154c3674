//! Attempt limits and delays between attempts.

use std::time::Duration;

use floodguard_config::{BackoffConfig, JobsConfig};

/// Delay before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed(Duration),
    /// Doubles per failed attempt, capped at `max`.
    Exponential {
        /// Delay after the first failure.
        base: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(31);
                base.saturating_mul(1u32 << exponent).min(max)
            }
        }
    }
}

impl From<BackoffConfig> for Backoff {
    fn from(config: BackoffConfig) -> Self {
        match config {
            BackoffConfig::Fixed { delay_ms } => Self::Fixed(Duration::from_millis(delay_ms)),
            BackoffConfig::Exponential { base_ms, max_ms } => Self::Exponential {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
            },
        }
    }
}

/// How many times a job runs and how long it waits in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Builds the policy from the `[jobs]` section.
    #[must_use]
    pub fn from_config(config: &JobsConfig) -> Self {
        Self::new(config.max_attempts, config.backoff.into())
    }

    /// Delay before retrying after `attempts_made` attempts, or `None` once
    /// the attempts are used up.
    #[must_use]
    pub fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        (attempts_made < self.max_attempts).then(|| self.backoff.delay(attempts_made))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(6), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_millis(250));
        assert_eq!(backoff.delay(1), backoff.delay(5));
    }

    #[test]
    fn attempts_are_capped() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(10)));
        assert!(policy.next_delay(1).is_some());
        assert!(policy.next_delay(2).is_some());
        assert!(policy.next_delay(3).is_none());
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO));
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.next_delay(1).is_none());
    }

    #[test]
    fn policy_follows_default_config() {
        let jobs = floodguard_config::FloodguardConfig::defaults().jobs;
        let policy = RetryPolicy::from_config(&jobs);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(1000),
                max: Duration::from_millis(30_000),
            }
        );
    }
}
