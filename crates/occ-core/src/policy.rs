//! Retry policies for conflicting read-modify-write operations.

use std::time::Duration;

use rand::Rng;

use crate::error::PolicyError;

/// Retry policy configuration.
///
/// The policy is plain data: hand it to a [`crate::ConflictRetrier`], which
/// validates it once and then only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on the un-jittered delay.
    pub max_backoff: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomized in both directions.
    pub jitter_fraction: f64,
    /// Optional bound on the total time spent sleeping between attempts.
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Create a new retry policy with default backoff settings.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Create a policy with a single attempt and no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_fraction: 0.0,
            max_elapsed: None,
        }
    }

    /// Create a steeply growing policy for generic remote calls.
    ///
    /// Four attempts, 10ms initial delay multiplied by 5 each step.
    pub fn steep() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 5.0,
            jitter_fraction: 0.1,
            max_elapsed: None,
        }
    }

    /// Set the initial backoff.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the backoff ceiling.
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction;
        self
    }

    /// Bound the total time spent sleeping between attempts.
    pub fn with_max_elapsed(mut self, limit: Duration) -> Self {
        self.max_elapsed = Some(limit);
        self
    }

    /// Check that the policy is usable.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(self.backoff_multiplier));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(PolicyError::InvalidJitter(self.jitter_fraction));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(PolicyError::BackoffBounds {
                initial: self.initial_backoff,
                max: self.max_backoff,
            });
        }
        Ok(())
    }

    /// Calculate the un-jittered delay after a failed attempt (1-indexed).
    ///
    /// `min(max_backoff, initial_backoff * multiplier^(attempt - 1))`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let cap = self.max_backoff.as_secs_f64();
        let mut delay = self.initial_backoff.as_secs_f64().min(cap);

        for _ in 1..attempt.max(1) {
            if delay >= cap || delay == 0.0 || self.backoff_multiplier <= 1.0 {
                break;
            }
            delay = (delay * self.backoff_multiplier).min(cap);
        }

        Duration::try_from_secs_f64(delay).unwrap_or(self.max_backoff)
    }

    /// Calculate the delay after a failed attempt, scaled by a random factor
    /// in `[1 - jitter_fraction, 1 + jitter_fraction]`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter_fraction <= 0.0 || base.is_zero() {
            return base;
        }

        let factor =
            rng.gen_range((1.0 - self.jitter_fraction)..=(1.0 + self.jitter_fraction));
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
    }
}

impl Default for RetryPolicy {
    /// Five attempts 10ms apart with 10% jitter.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            jitter_fraction: 0.1,
            max_elapsed: None,
        }
    }
}
