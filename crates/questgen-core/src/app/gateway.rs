//! Gateway - ジョブ投入口
//!
//! Validates a submission, creates the PENDING record, hands the id to the
//! broker and returns. Nothing here waits on execution.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{JobError, JobId, JobPayload, JobRecord, TASK_NAME};
use crate::ports::{Broker, IdGenerator, RecordStore, RecordStoreError};
use crate::store::ResultStore;

pub struct Gateway {
    store: Arc<ResultStore>,
    broker: Arc<dyn Broker>,
    records: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    max_attempts: u32,
}

impl Gateway {
    pub fn new(
        store: Arc<ResultStore>,
        broker: Arc<dyn Broker>,
        records: Arc<dyn RecordStore>,
        ids: Arc<dyn IdGenerator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            broker,
            records,
            ids,
            max_attempts,
        }
    }

    /// Submit one job and return its handle.
    ///
    /// Fails synchronously only with `Validation` (unknown preference),
    /// `RecordStore` (preference lookup impossible) or `QueueUnavailable`.
    /// When the broker refuses the id the record is dropped again, so a
    /// failed submission leaves nothing behind.
    pub async fn submit(&self, payload: JobPayload) -> Result<JobId, JobError> {
        let preference_id = payload.preference_id();
        let preference = match self.records.read_preference(preference_id).await {
            Ok(p) => p,
            Err(e) if e.is_not_found() => {
                return Err(JobError::Validation(format!(
                    "preference {preference_id} does not exist"
                )));
            }
            Err(e) => return Err(JobError::RecordStore(e.to_string())),
        };

        let payload = if payload.user_context().is_some() {
            payload
        } else {
            match self.records.read_user(preference.user_id).await {
                Ok(user) => payload.with_default_context(user.profile_context()),
                Err(RecordStoreError::NotFound { .. }) => {
                    debug!(preference_id = preference_id.get(), "owner not found; no default context");
                    payload
                }
                Err(e) => {
                    warn!(preference_id = preference_id.get(), error = %e, "could not read owner profile");
                    payload
                }
            }
        };

        let job_id = self.ids.generate_job_id();
        let now = self.store.clock().now();
        self.store
            .insert(JobRecord::new(job_id, payload, self.max_attempts, now))?;

        if let Err(e) = self.broker.enqueue(job_id).await {
            self.store.remove(job_id);
            warn!(job_id = %job_id, kind = ?e.kind(), error = %e, "enqueue refused; submission dropped");
            return Err(e);
        }

        info!(
            job_id = %job_id,
            task = TASK_NAME,
            preference_id = preference_id.get(),
            "job submitted"
        );
        Ok(job_id)
    }
}
