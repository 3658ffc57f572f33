//! Job state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// State transitions:
/// - Pending -> Started -> Success
/// - Pending -> Started -> Retry -> Started (loop until max_attempts)
/// - Pending -> Started -> Failure (attempts exhausted, or non-retryable failure)
///
/// Serialized as SCREAMING_SNAKE_CASE: PENDING / STARTED / RETRY / SUCCESS / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Submitted, waiting for its first pickup.
    Pending,

    /// Held by a worker; an attempt is in flight.
    Started,

    /// Last attempt failed; re-enqueued for another attempt.
    Retry,

    /// Finished with a result.
    Success,

    /// Finished without a result; attempts exhausted or failure was permanent.
    Failure,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Started,
        JobState::Retry,
        JobState::Success,
        JobState::Failure,
    ];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Started)
                | (Retry, Started)
                | (Started, Success)
                | (Started, Retry)
                | (Started, Failure)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Started => "STARTED",
            JobState::Retry => "RETRY",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
