//! Outcome model: why an attempt failed, and what a finished job holds.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;
use super::ids::PreferenceId;
use super::questions::GenerationReport;

/// Why one attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The generator or the record store raised an error.
    Execution { message: String },

    /// The attempt exceeded the execution window and was abandoned.
    Timeout { after_ms: u64 },

    /// The preference disappeared from the record store.
    PreferenceNotFound { preference_id: PreferenceId },

    /// A retry could not be handed back to the broker.
    QueueUnavailable { message: String },
}

impl FailureReason {
    pub fn execution(message: impl Into<String>) -> Self {
        FailureReason::Execution {
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        FailureReason::Timeout {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureReason::Execution { .. } | FailureReason::Timeout { .. } => {
                ErrorKind::Transient
            }
            FailureReason::PreferenceNotFound { .. } => ErrorKind::Permanent,
            FailureReason::QueueUnavailable { .. } => ErrorKind::Infrastructure,
        }
    }

    /// Does another attempt have a chance of succeeding?
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Execution { message } => write!(f, "execution failed: {message}"),
            FailureReason::Timeout { after_ms } => {
                write!(f, "execution timed out after {:?}", Duration::from_millis(*after_ms))
            }
            FailureReason::PreferenceNotFound { preference_id } => {
                write!(f, "preference {preference_id} not found")
            }
            FailureReason::QueueUnavailable { message } => {
                write!(f, "could not re-enqueue retry: {message}")
            }
        }
    }
}

/// Terminal failure detail stored as the result of a `FAILURE` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub reason: FailureReason,

    /// Human-readable summary: last reason plus attempt count.
    pub message: String,

    pub attempts: u32,
    pub max_attempts: u32,
}

impl FailureDetail {
    pub fn new(reason: FailureReason, attempts: u32, max_attempts: u32) -> Self {
        let message = format!("{reason} (attempt {attempts}/{max_attempts})");
        Self {
            reason,
            message,
            attempts,
            max_attempts,
        }
    }
}

/// Result of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Success(GenerationReport),
    Failure(FailureDetail),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&GenerationReport> {
        match self {
            JobOutcome::Success(report) => Some(report),
            JobOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureDetail> {
        match self {
            JobOutcome::Success(_) => None,
            JobOutcome::Failure(detail) => Some(detail),
        }
    }
}
