//! Broker port - 配送キュー
//!
//! The broker carries job ids only; state and payload live in the result
//! store. A popped id is owned by exactly one worker for that attempt, and a
//! retry is delivered again only when the worker re-enqueues it.

use async_trait::async_trait;

use crate::domain::{JobError, JobId};

#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a job id at the back of the queue.
    ///
    /// Fails with `JobError::QueueUnavailable` when the broker cannot accept work.
    async fn enqueue(&self, job_id: JobId) -> Result<(), JobError>;

    /// Take the oldest job id, waiting while the queue is empty.
    ///
    /// `Ok(None)` means the broker was closed and no more work will arrive.
    async fn dequeue(&self) -> Result<Option<JobId>, JobError>;

    /// Stop accepting work and wake every waiting `dequeue`.
    async fn close(&self);

    /// Number of ids waiting for delivery.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
