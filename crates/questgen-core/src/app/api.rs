//! JobApi - HTTP 層から見た表面
//!
//! Two calls only: submit a job and get a string handle back, or poll a
//! handle. Everything the caller learns about execution comes from polling.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Gateway;
use crate::domain::{GenerationReport, JobError, JobId, JobOutcome, JobPayload, JobState, JobView};
use crate::store::{ResultStore, StateCounts};

/// Poll response, shaped like the task-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub task_id: String,
    pub state: JobState,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobView> for JobStatusResponse {
    fn from(view: JobView) -> Self {
        let status = match view.state {
            JobState::Pending => "Task is waiting to be processed".to_string(),
            JobState::Success => "Task completed successfully".to_string(),
            JobState::Failure => "Task failed".to_string(),
            other => format!("Task is {}", other.as_str().to_lowercase()),
        };
        let (result, error) = match view.result {
            Some(JobOutcome::Success(report)) => (Some(report), None),
            Some(JobOutcome::Failure(detail)) => (None, Some(detail.message)),
            None => (None, None),
        };
        Self {
            task_id: view.job_id.to_string(),
            state: view.state,
            status,
            result,
            error,
        }
    }
}

#[derive(Clone)]
pub struct JobApi {
    gateway: Arc<Gateway>,
    store: Arc<ResultStore>,
}

impl JobApi {
    pub fn new(gateway: Arc<Gateway>, store: Arc<ResultStore>) -> Self {
        Self { gateway, store }
    }

    /// Validate and submit; returns the `job-<ULID>` handle.
    pub async fn submit_job(
        &self,
        preference_id: i64,
        user_context: Option<String>,
    ) -> Result<String, JobError> {
        let payload = JobPayload::new(preference_id, user_context)?;
        let job_id = self.gateway.submit(payload).await?;
        Ok(job_id.to_string())
    }

    /// Current status of a handle. Malformed handles are reported as not found.
    pub fn get_job_status(&self, job_id: &str) -> Result<JobStatusResponse, JobError> {
        let id: JobId = job_id
            .parse()
            .map_err(|_| JobError::JobNotFound(job_id.to_string()))?;
        Ok(self.store.get_state(id)?.into())
    }

    pub fn counts(&self) -> StateCounts {
        self.store.counts_by_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureReason, JobRecord, PreferenceId, QuestionId};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn record() -> JobRecord {
        JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            JobPayload::new(3, None).unwrap(),
            3,
            Utc::now(),
        )
    }

    #[rstest]
    #[case::pending(JobState::Pending, "Task is waiting to be processed")]
    #[case::started(JobState::Started, "Task is started")]
    #[case::retry(JobState::Retry, "Task is retry")]
    fn non_terminal_status_lines(#[case] state: JobState, #[case] expected: &str) {
        let mut job = record();
        if state != JobState::Pending {
            job.start_attempt(Utc::now()).unwrap();
        }
        if state == JobState::Retry {
            job.schedule_retry(FailureReason::execution("x")).unwrap();
        }
        let resp = JobStatusResponse::from(job.view());
        assert_eq!(resp.state, state);
        assert_eq!(resp.status, expected);
        assert!(resp.result.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn success_carries_report() {
        let mut job = record();
        job.start_attempt(Utc::now()).unwrap();
        let report = GenerationReport::new(PreferenceId(3), vec![QuestionId(10), QuestionId(11)]);
        job.mark_succeeded(report.clone(), Utc::now()).unwrap();

        let resp = JobStatusResponse::from(job.view());
        assert_eq!(resp.status, "Task completed successfully");
        assert_eq!(resp.task_id, job.job_id().to_string());
        assert_eq!(resp.result, Some(report));
        assert!(resp.error.is_none());
    }

    #[test]
    fn failure_carries_error() {
        let mut job = record();
        job.start_attempt(Utc::now()).unwrap();
        job.mark_failed(FailureReason::execution("model down"), Utc::now())
            .unwrap();

        let resp = JobStatusResponse::from(job.view());
        assert_eq!(resp.status, "Task failed");
        assert_eq!(
            resp.error.as_deref(),
            Some("execution failed: model down (attempt 1/3)")
        );
        assert!(resp.result.is_none());
    }

    #[test]
    fn response_json_omits_absent_fields() {
        let resp = JobStatusResponse::from(record().view());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["state"], "PENDING");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }
}
