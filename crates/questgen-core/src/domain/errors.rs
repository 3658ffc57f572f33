//! Errors and their operational classification.

use thiserror::Error;

use super::ids::JobId;
use super::state::JobState;

/// Operational classification of a failure.
///
/// Shared by [`JobError`] and the attempt-level `FailureReason`.
///
/// - Transient: worth retrying (generator hiccup, timeout)
/// - Permanent: retrying cannot help (missing dependency, bad input)
/// - Infrastructure: the broker or a backend is down; not the job's fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("record store unavailable: {0}")]
    RecordStore(String),

    #[error("job {job_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("duplicate job id: {0}")]
    DuplicateJob(JobId),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::QueueUnavailable(_) | JobError::RecordStore(_) => ErrorKind::Infrastructure,
            JobError::Validation(_)
            | JobError::JobNotFound(_)
            | JobError::InvalidTransition { .. }
            | JobError::DuplicateJob(_) => ErrorKind::Permanent,
        }
    }
}
