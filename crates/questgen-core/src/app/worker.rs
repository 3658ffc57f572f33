//! Worker pool - dequeue → start → run (bounded) → decide → record
//!
//! # フロー
//! 1. `Broker::dequeue()` で job_id を取得
//! 2. `ResultStore::begin_attempt()` で PENDING/RETRY → STARTED
//! 3. preference を読み、generator を呼び、質問を保存（時間制限つき）
//! 4. 成功なら SUCCESS、失敗なら `RetryPolicy::decide()` に従う
//!
//! A worker holds one job at a time. Distinct workers never see the same id
//! for the same attempt: the broker hands each id out once and
//! `begin_attempt` refuses a job that is already STARTED.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{
    FailureReason, GenerationReport, JobError, JobId, PreferenceId, PreferenceStatus,
};
use crate::policy::{Decision, RetryPolicy};
use crate::ports::{Broker, QuestionGenerator, RecordStore};
use crate::store::{AttemptTicket, ResultStore};

/// Pause after a failed dequeue before asking the broker again.
const DEQUEUE_BACKOFF: Duration = Duration::from_secs(1);

/// Time bounds of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Hard window: the attempt is abandoned when it expires.
    pub timeout: Duration,

    /// Fires the attempt's cancellation token early; must be below `timeout`.
    pub soft_limit: Option<Duration>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            soft_limit: Some(Duration::from_secs(240)),
        }
    }
}

/// Runs individual attempts. Shared by every worker of a pool.
pub struct JobRunner {
    store: Arc<ResultStore>,
    broker: Arc<dyn Broker>,
    records: Arc<dyn RecordStore>,
    generator: Arc<dyn QuestionGenerator>,
    policy: RetryPolicy,
    limits: ExecutionLimits,
    /// Retries sleeping out their backoff before re-enqueue.
    delayed: Mutex<HashMap<JobId, (PreferenceId, JoinHandle<()>)>>,
}

impl JobRunner {
    pub fn new(
        store: Arc<ResultStore>,
        broker: Arc<dyn Broker>,
        records: Arc<dyn RecordStore>,
        generator: Arc<dyn QuestionGenerator>,
        policy: RetryPolicy,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            store,
            broker,
            records,
            generator,
            policy,
            limits,
            delayed: Mutex::new(HashMap::new()),
        }
    }

    /// Take one delivered job through one attempt.
    pub async fn process(self: &Arc<Self>, worker: usize, job_id: JobId) {
        let ticket = match self.store.begin_attempt(job_id) {
            Ok(ticket) => ticket,
            Err(JobError::JobNotFound(_)) => {
                warn!(job_id = %job_id, worker, "delivered job no longer exists; skipped");
                return;
            }
            Err(e) => {
                warn!(job_id = %job_id, worker, error = %e, "delivered job is not startable; skipped");
                return;
            }
        };
        let preference_id = ticket.payload.preference_id();
        info!(
            job_id = %job_id,
            worker,
            attempt = ticket.attempt,
            max_attempts = ticket.max_attempts,
            "attempt started"
        );

        self.set_status(preference_id, PreferenceStatus::Generating)
            .await;

        match self.run_bounded(&ticket).await {
            Ok(report) => {
                let created = report.questions_created;
                if let Err(e) = self.store.complete(job_id, report) {
                    error!(job_id = %job_id, worker, error = %e, "could not record success");
                    return;
                }
                info!(
                    job_id = %job_id,
                    worker,
                    attempt = ticket.attempt,
                    questions_created = created,
                    "job succeeded"
                );
                self.set_status(preference_id, PreferenceStatus::Completed)
                    .await;
            }
            Err(reason) => self.handle_failure(worker, &ticket, reason).await,
        }
    }

    /// Run the attempt under the soft and hard limits.
    async fn run_bounded(&self, ticket: &AttemptTicket) -> Result<GenerationReport, FailureReason> {
        let cancel = CancellationToken::new();
        let attempt = self.run_attempt(ticket, cancel.clone());
        tokio::pin!(attempt);
        let hard = tokio::time::sleep(self.limits.timeout);
        tokio::pin!(hard);

        if let Some(soft) = self.limits.soft_limit {
            tokio::select! {
                res = &mut attempt => return res,
                _ = &mut hard => return Err(self.abandon_attempt(ticket, &cancel)),
                _ = tokio::time::sleep(soft) => {
                    warn!(job_id = %ticket.job_id, attempt = ticket.attempt, "soft time limit reached; cancelling");
                    cancel.cancel();
                }
            }
            return tokio::select! {
                res = &mut attempt => res,
                _ = &mut hard => Err(self.abandon_attempt(ticket, &cancel)),
            };
        }

        tokio::select! {
            res = &mut attempt => res,
            _ = &mut hard => Err(self.abandon_attempt(ticket, &cancel)),
        }
    }

    fn abandon_attempt(&self, ticket: &AttemptTicket, cancel: &CancellationToken) -> FailureReason {
        cancel.cancel();
        warn!(
            job_id = %ticket.job_id,
            attempt = ticket.attempt,
            timeout_ms = u64::try_from(self.limits.timeout.as_millis()).unwrap_or(u64::MAX),
            "execution timed out; attempt abandoned"
        );
        FailureReason::timeout(self.limits.timeout)
    }

    /// read preference → generate → save questions.
    async fn run_attempt(
        &self,
        ticket: &AttemptTicket,
        cancel: CancellationToken,
    ) -> Result<GenerationReport, FailureReason> {
        let preference_id = ticket.payload.preference_id();
        let preference = self
            .records
            .read_preference(preference_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    FailureReason::PreferenceNotFound { preference_id }
                } else {
                    FailureReason::execution(e.to_string())
                }
            })?;

        // A generator that gives up after the soft signal has timed out.
        // Failures outside the generator keep their own cause.
        let questions = self
            .generator
            .generate(&preference, ticket.payload.user_context(), cancel.clone())
            .await
            .map_err(|e| match self.limits.soft_limit {
                Some(soft) if cancel.is_cancelled() => FailureReason::timeout(soft),
                _ => FailureReason::execution(e.to_string()),
            })?;

        let ids = self
            .records
            .save_questions(preference_id, &questions)
            .await
            .map_err(|e| FailureReason::execution(e.to_string()))?;

        Ok(GenerationReport::new(preference_id, ids))
    }

    async fn handle_failure(self: &Arc<Self>, worker: usize, ticket: &AttemptTicket, reason: FailureReason) {
        let job_id = ticket.job_id;
        match self
            .policy
            .decide(ticket.attempt, ticket.max_attempts, reason)
        {
            Decision::Fail { reason } => {
                if let Err(e) = self.store.fail(job_id, reason.clone()) {
                    error!(job_id = %job_id, worker, error = %e, "could not record failure");
                    return;
                }
                error!(
                    job_id = %job_id,
                    worker,
                    attempt = ticket.attempt,
                    error = %reason,
                    "job failed"
                );
                self.set_status(ticket.payload.preference_id(), PreferenceStatus::Failed)
                    .await;
            }
            Decision::Retry { delay, reason } => {
                if let Err(e) = self.store.retry(job_id, reason.clone()) {
                    error!(job_id = %job_id, worker, error = %e, "could not schedule retry");
                    return;
                }
                warn!(
                    job_id = %job_id,
                    worker,
                    attempt = ticket.attempt,
                    error = %reason,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "attempt failed; retry scheduled"
                );
                if delay.is_zero() {
                    self.requeue(job_id, ticket.payload.preference_id()).await;
                } else {
                    let this = Arc::clone(self);
                    let preference_id = ticket.payload.preference_id();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        this.requeue(job_id, preference_id).await;
                    });
                    let mut delayed = lock(&self.delayed);
                    delayed.retain(|_, (_, h)| !h.is_finished());
                    delayed.insert(job_id, (preference_id, handle));
                }
            }
        }
    }

    /// Hand a RETRY job back to the broker; fail it if the broker refuses.
    async fn requeue(&self, job_id: JobId, preference_id: PreferenceId) {
        let Err(e) = self.broker.enqueue(job_id).await else {
            debug!(job_id = %job_id, "retry re-enqueued");
            return;
        };
        error!(job_id = %job_id, error = %e, "could not re-enqueue retry; failing job");
        let reason = FailureReason::QueueUnavailable {
            message: e.to_string(),
        };
        if let Err(e) = self.store.abandon(job_id, reason) {
            error!(job_id = %job_id, error = %e, "could not record failure");
            return;
        }
        self.set_status(preference_id, PreferenceStatus::Failed)
            .await;
    }

    /// Fail every retry still waiting out its backoff delay.
    ///
    /// Called once the workers have stopped; nothing would pick these jobs
    /// up again, so they end in FAILURE instead of staying RETRY.
    pub async fn abandon_delayed_retries(&self) {
        let waiting: Vec<_> = lock(&self.delayed).drain().collect();
        for (job_id, (preference_id, handle)) in waiting {
            if handle.is_finished() {
                continue;
            }
            handle.abort();
            // Ok means the re-enqueue ran before the abort landed
            if handle.await.is_ok() {
                continue;
            }
            warn!(job_id = %job_id, "shut down before retry came due; failing job");
            let reason = FailureReason::QueueUnavailable {
                message: "worker pool shut down before the retry was re-enqueued".into(),
            };
            if let Err(e) = self.store.abandon(job_id, reason) {
                error!(job_id = %job_id, error = %e, "could not record failure");
                continue;
            }
            self.set_status(preference_id, PreferenceStatus::Failed)
                .await;
        }
    }

    /// Best-effort preference status write.
    async fn set_status(&self, preference_id: PreferenceId, status: PreferenceStatus) {
        if let Err(e) = self
            .records
            .set_preference_status(preference_id, status)
            .await
        {
            warn!(
                preference_id = preference_id.get(),
                status = %status,
                error = %e,
                "preference status update failed"
            );
        }
    }
}

/// Worker pool handle.
/// - `request_shutdown()` でワーカーは新しいジョブを取らなくなる
/// - `shutdown_and_join()` で実行中のジョブを終えるまで待つ
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    runner: Arc<JobRunner>,
}

impl WorkerPool {
    /// Spawn `n` workers sharing `runner`.
    pub fn spawn(n: usize, runner: Arc<JobRunner>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker in 0..n {
            let runner = Arc::clone(&runner);
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(worker_loop(worker, runner, rx)));
        }
        info!(workers = n, "worker pool started");

        Self {
            shutdown_tx,
            joins,
            runner,
        }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Stop taking new jobs. In-flight attempts run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers, then fail retries that never
    /// came due.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "worker task panicked");
            }
        }
        self.runner.abandon_delayed_retries().await;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn worker_loop(worker: usize, runner: Arc<JobRunner>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue は待つことがあるので shutdown と競合させる
        let next = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = runner.broker.dequeue() => next,
        };

        match next {
            Ok(Some(job_id)) => runner.process(worker, job_id).await,
            Ok(None) => {
                debug!(worker, "broker closed");
                break;
            }
            Err(e) => {
                error!(worker, error = %e, "dequeue failed; backing off");
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(DEQUEUE_BACKOFF) => {}
                }
            }
        }
    }
    debug!(worker, "worker stopped");
}
