//! Bounded retry with exponential backoff and jitter.
//!
//! Retries happen inline inside a fanout delivery task. Only outcomes that
//! could plausibly change on a second attempt are retried: transient
//! rejections (429, 5xx, ...) and network-level transport failures. Dead
//! endpoints and client errors are final on the first attempt.

use std::time::Duration;

use rand::Rng;

use crate::outcome::DeliveryOutcome;

/// Retry policy for push deliveries within a single broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts (including initial attempt).
    pub max_attempts: u32,

    /// Base delay for exponential backoff calculation.
    pub base_delay: Duration,

    /// Maximum delay between retry attempts.
    pub max_delay: Duration,

    /// Jitter percentage (0.0 to 1.0) to add randomness.
    pub jitter_factor: f64,

    /// Strategy for calculating backoff delays.
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.25,
            backoff_strategy: BackoffStrategy::Exponential,
        }
    }
}

/// Strategy for calculating retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff: delay doubles each attempt.
    Exponential,
    /// Linear backoff: delay increases by base amount each attempt.
    Linear,
}

/// Result of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after the given delay.
    Retry {
        /// Time to wait before the next attempt
        delay: Duration,
    },
    /// Keep the current outcome as final.
    GiveUp {
        /// Reason why the delivery should not be retried
        reason: String,
    },
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this policy permits any retry at all.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Decides whether attempt number `attempt` (1-based) should be retried.
    ///
    /// A Retry-After hint on the outcome overrides the computed backoff but
    /// is still capped at `max_delay`.
    pub fn decide(&self, attempt: u32, outcome: &DeliveryOutcome) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) exceeded", self.max_attempts),
            };
        }

        if !outcome.is_retryable() {
            return RetryDecision::GiveUp { reason: "non-retryable outcome".to_string() };
        }

        let delay = match outcome.retry_after_seconds() {
            Some(seconds) => std::cmp::min(Duration::from_secs(seconds), self.max_delay),
            None => self.backoff_delay(attempt),
        };

        RetryDecision::Retry { delay }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_delay = match self.backoff_strategy {
            BackoffStrategy::Fixed => Some(self.base_delay),
            BackoffStrategy::Linear => self.base_delay.checked_mul(attempt),
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(20);
                self.base_delay.checked_mul(2_u32.saturating_pow(exponent))
            },
        }
        .unwrap_or(self.max_delay);

        let capped_delay = std::cmp::min(base_delay, self.max_delay);
        std::cmp::min(apply_jitter(capped_delay, self.jitter_factor), self.max_delay)
    }
}

/// Randomizes a delay by ±`jitter_factor` of its length.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 || duration.is_zero() {
        return duration;
    }

    let clamped_jitter = jitter_factor.clamp(0.0, 1.0);

    let mut rng = rand::rng();
    let jitter_range = duration.as_secs_f64() * clamped_jitter;
    let jitter_offset = rng.random_range(-jitter_range..=jitter_range);

    Duration::from_secs_f64((duration.as_secs_f64() + jitter_offset).max(0.0))
}
