//! Retry/Timeout policy.
//!
//! `RetryPolicy::decide` is a pure function of
//! `(attempt_count, max_attempts, failure_reason)`; applying the decision
//! (state change, re-enqueue) is the worker's job.

mod backoff;

use std::time::Duration;

pub use backoff::Backoff;

use crate::domain::FailureReason;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The next action for a job whose attempt just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Move to RETRY and re-enqueue after `delay`.
    Retry {
        delay: Duration,
        reason: FailureReason,
    },

    /// Move to FAILURE with `reason` as the terminal cause.
    Fail { reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts granted to each new job (captured on the record at submission).
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Immediate,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Decide what happens after attempt number `attempt_count` failed.
    ///
    /// - non-retryable reason: fail now, whatever attempts remain
    /// - attempts left: retry after the backoff delay
    /// - otherwise: fail
    pub fn decide(&self, attempt_count: u32, max_attempts: u32, reason: FailureReason) -> Decision {
        if !reason.is_retryable() || attempt_count >= max_attempts {
            return Decision::Fail { reason };
        }
        Decision::Retry {
            delay: self.backoff.delay_for(attempt_count),
            reason,
        }
    }
}
