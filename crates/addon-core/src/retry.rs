//! Retrying failed deployments
//!
//! A single pass (one attempt) is the default. With more attempts, the
//! wait between them grows exponentially up to `max_interval`.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};

/// How often and how patiently to retry a failing deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 count as 1
    pub max_attempts: u32,
    /// Wait before the second attempt, in milliseconds
    pub initial_interval_ms: u64,
    /// Upper bound on any single wait, in milliseconds
    pub max_interval_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_pass()
    }
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn single_pass() -> Self {
        Self {
            max_attempts: 1,
            initial_interval_ms: 500,
            max_interval_ms: 30_000,
            multiplier: 2.0,
        }
    }

    /// `attempts` total attempts with default intervals.
    pub fn attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Self::single_pass()
        }
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval_ms = initial.as_millis() as u64;
        self.max_interval_ms = max.as_millis() as u64;
        self
    }

    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn retries(&self) -> bool {
        self.effective_attempts() > 1
    }

    /// A fresh backoff schedule for one add-on.
    pub fn backoff(&self) -> RetryBackoff {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_interval_ms))
            .with_max_interval(Duration::from_millis(
                self.max_interval_ms.max(self.initial_interval_ms),
            ))
            .with_multiplier(self.multiplier.max(1.0))
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();
        RetryBackoff {
            inner,
            remaining: self.effective_attempts().saturating_sub(1),
        }
    }
}

/// Wait schedule between attempts of one deployment.
#[derive(Debug)]
pub struct RetryBackoff {
    inner: ExponentialBackoff,
    remaining: u32,
}

impl RetryBackoff {
    /// The wait before the next attempt, or `None` once attempts run out.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.inner.next_backoff()
    }
}
