//! Job record and its read-only view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::JobError;
use super::ids::JobId;
use super::outcome::{FailureDetail, FailureReason, JobOutcome};
use super::payload::JobPayload;
use super::questions::GenerationReport;
use super::state::JobState;

/// Job record: identity + lifecycle of one unit of work.
///
/// Design:
/// - This is the single source of truth for a job's state.
/// - All state transitions happen through the methods here; a rejected
///   transition leaves the record untouched.
/// - `result` is written in the same call that enters a terminal state, so a
///   reader holding the record lock never sees one without the other.
#[derive(Debug, Clone)]
pub struct JobRecord {
    job_id: JobId,
    payload: JobPayload,
    state: JobState,

    /// Number of attempts started so far (including the one in flight).
    attempt_count: u32,
    max_attempts: u32,

    result: Option<JobOutcome>,

    /// Most recent failure, kept while the job is retrying.
    last_error: Option<FailureReason>,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(job_id: JobId, payload: JobPayload, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            payload,
            state: JobState::Pending,
            attempt_count: 0,
            max_attempts,
            result: None,
            last_error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn check(&self, next: JobState) -> Result<(), JobError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(self.invalid(next))
        }
    }

    fn invalid(&self, next: JobState) -> JobError {
        JobError::InvalidTransition {
            job_id: self.job_id,
            from: self.state,
            to: next,
        }
    }

    /// Pending/Retry -> Started. Returns the number of the attempt now in flight.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> Result<u32, JobError> {
        self.check(JobState::Started)?;
        if self.attempt_count >= self.max_attempts {
            return Err(self.invalid(JobState::Started));
        }
        self.state = JobState::Started;
        self.attempt_count += 1;
        self.started_at = Some(now);
        Ok(self.attempt_count)
    }

    /// Started -> Success.
    pub fn mark_succeeded(
        &mut self,
        report: GenerationReport,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        self.check(JobState::Success)?;
        self.state = JobState::Success;
        self.result = Some(JobOutcome::Success(report));
        self.finished_at = Some(now);
        Ok(())
    }

    /// Started -> Retry. Only legal while attempts remain.
    pub fn schedule_retry(&mut self, reason: FailureReason) -> Result<(), JobError> {
        self.check(JobState::Retry)?;
        if self.attempt_count >= self.max_attempts {
            return Err(self.invalid(JobState::Retry));
        }
        self.state = JobState::Retry;
        self.last_error = Some(reason);
        Ok(())
    }

    /// Started -> Failure.
    pub fn mark_failed(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<(), JobError> {
        self.check(JobState::Failure)?;
        let detail = FailureDetail::new(reason.clone(), self.attempt_count, self.max_attempts);
        self.state = JobState::Failure;
        self.last_error = Some(reason);
        self.result = Some(JobOutcome::Failure(detail));
        self.finished_at = Some(now);
        Ok(())
    }

    /// Fail a job that was never handed to a worker (e.g. it could not be
    /// re-enqueued). Allowed from Retry as well as Started.
    pub fn abandon(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<(), JobError> {
        if self.state == JobState::Retry {
            // Retry -> Failure is not a worker transition; route it through Started
            // without counting a new attempt.
            self.state = JobState::Started;
        }
        self.mark_failed(reason, now)
    }

    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.job_id,
            state: self.state,
            payload: self.payload.clone(),
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
            result: self.result.clone(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only snapshot of a job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub state: JobState,
    pub payload: JobPayload,
    pub attempt_count: u32,
    pub max_attempts: u32,

    /// Set iff `state` is terminal.
    pub result: Option<JobOutcome>,

    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{PreferenceId, QuestionId};
    use ulid::Ulid;

    fn record(max_attempts: u32) -> JobRecord {
        JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            JobPayload::new(1, None).unwrap(),
            max_attempts,
            Utc::now(),
        )
    }

    fn report() -> GenerationReport {
        GenerationReport::new(PreferenceId(1), vec![QuestionId(1)])
    }

    #[test]
    fn new_job_starts_pending_without_result() {
        let job = record(3);
        let view = job.view();
        assert_eq!(view.state, JobState::Pending);
        assert_eq!(view.attempt_count, 0);
        assert!(view.result.is_none());
        assert!(view.started_at.is_none());
    }

    #[test]
    fn success_sets_result_and_finish_time_together() {
        let mut job = record(3);
        assert_eq!(job.start_attempt(Utc::now()).unwrap(), 1);
        assert!(job.view().result.is_none());

        job.mark_succeeded(report(), Utc::now()).unwrap();
        let view = job.view();
        assert_eq!(view.state, JobState::Success);
        assert_eq!(view.attempt_count, 1);
        assert!(view.result.as_ref().is_some_and(JobOutcome::is_success));
        assert!(view.finished_at.is_some());
    }

    #[test]
    fn retry_loop_until_exhausted() {
        let mut job = record(2);
        job.start_attempt(Utc::now()).unwrap();
        job.schedule_retry(FailureReason::execution("e1")).unwrap();
        assert_eq!(job.state(), JobState::Retry);
        assert!(job.view().result.is_none());
        assert_eq!(job.view().last_error.as_deref(), Some("execution failed: e1"));

        job.start_attempt(Utc::now()).unwrap();
        // No attempts left: retry is refused and the record is unchanged.
        let err = job
            .schedule_retry(FailureReason::execution("e2"))
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(job.state(), JobState::Started);

        job.mark_failed(FailureReason::execution("e2"), Utc::now())
            .unwrap();
        let view = job.view();
        assert_eq!(view.state, JobState::Failure);
        assert_eq!(view.attempt_count, 2);
        let detail = view.result.as_ref().and_then(JobOutcome::failure).unwrap();
        assert_eq!(detail.attempts, 2);
        assert!(detail.message.contains("e2"));
    }

    #[test]
    fn cannot_start_beyond_max_attempts() {
        let mut job = record(1);
        job.start_attempt(Utc::now()).unwrap();
        job.mark_failed(FailureReason::execution("x"), Utc::now())
            .unwrap();
        assert!(job.start_attempt(Utc::now()).is_err());
        assert_eq!(job.attempt_count(), 1);
    }

    #[test]
    fn terminal_record_rejects_everything() {
        let mut job = record(3);
        job.start_attempt(Utc::now()).unwrap();
        job.mark_succeeded(report(), Utc::now()).unwrap();
        let before = job.view();

        assert!(job.start_attempt(Utc::now()).is_err());
        assert!(job.schedule_retry(FailureReason::execution("x")).is_err());
        assert!(
            job.mark_failed(FailureReason::execution("x"), Utc::now())
                .is_err()
        );
        assert_eq!(job.view(), before);
    }

    #[test]
    fn pending_cannot_succeed_directly() {
        let mut job = record(3);
        let err = job.mark_succeeded(report(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("PENDING -> SUCCESS"));
    }

    #[test]
    fn abandon_from_retry_keeps_attempt_count() {
        let mut job = record(3);
        job.start_attempt(Utc::now()).unwrap();
        job.schedule_retry(FailureReason::execution("e1")).unwrap();
        job.abandon(
            FailureReason::QueueUnavailable {
                message: "closed".into(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(job.state(), JobState::Failure);
        assert_eq!(job.attempt_count(), 1);
    }
}
