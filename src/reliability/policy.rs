//! Retry policy and backoff schedule.

use std::time::Duration;

use super::errors::ReliabilityError;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `max_retries + 1` attempts in total.
    pub max_retries: u32,
    pub backoff_multiplier: f64,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_multiplier: 2.0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Total attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before attempt `attempt` (0-based).
    ///
    /// Zero for the first attempt, then
    /// `min(initial_delay * backoff_multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Reject multipliers that are not finite and positive, and an initial
    /// delay above the maximum.
    pub fn validate(&self) -> Result<(), ReliabilityError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            return Err(ReliabilityError::InvalidPolicy {
                reason: format!(
                    "backoff multiplier must be finite and positive, got {}",
                    self.backoff_multiplier
                ),
            });
        }
        if self.initial_delay > self.max_delay {
            return Err(ReliabilityError::InvalidPolicy {
                reason: format!(
                    "initial delay {:?} exceeds max delay {:?}",
                    self.initial_delay, self.max_delay
                ),
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(500), Duration::from_secs(10));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());

        let bad_multiplier = RetryPolicy {
            backoff_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(bad_multiplier.validate().is_err());

        let inverted = RetryPolicy {
            initial_delay: Duration::from_secs(20),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
