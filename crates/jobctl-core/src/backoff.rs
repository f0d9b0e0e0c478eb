//! Exponential backoff between retries of a failed job.

use crate::{JobctlError, JobctlResult};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Default backoff base.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Upper bound on a single delay, roughly 317 years.
const MAX_DELAY_SECS: f64 = 1.0e10;

/// Exponential backoff: a job that has failed after `n` attempts waits
/// `base ^ n` seconds before it becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    base: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy. The base must be a positive, finite number.
    pub fn new(base: f64) -> JobctlResult<Self> {
        if !base.is_finite() || base <= 0.0 {
            return Err(JobctlError::validation(format!(
                "backoff base must be a positive number, got {base}"
            )));
        }
        Ok(Self { base })
    }

    /// Returns the configured base.
    #[must_use]
    pub const fn base(&self) -> f64 {
        self.base
    }

    /// Delay in seconds after `attempts` attempts, saturating at a very
    /// large bound instead of overflowing.
    #[must_use]
    pub fn delay_secs(&self, attempts: u32) -> f64 {
        let exp = i32::try_from(attempts).unwrap_or(i32::MAX);
        self.base.powi(exp).min(MAX_DELAY_SECS)
    }

    /// Delay after `attempts` attempts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn delay_for_attempt(&self, attempts: u32) -> TimeDelta {
        let millis = (self.delay_secs(attempts) * 1000.0).round() as i64;
        TimeDelta::milliseconds(millis)
    }
}
