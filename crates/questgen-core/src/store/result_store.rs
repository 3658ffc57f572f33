//! Result store: current state of every job, readable by handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RetentionPolicy;
use crate::domain::{
    FailureReason, GenerationReport, JobError, JobId, JobPayload, JobRecord, JobState, JobView,
};
use crate::ports::Clock;

/// Per-state job counts for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: usize,
    pub started: usize,
    pub retry: usize,
    pub success: usize,
    pub failure: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.pending + self.started + self.retry + self.success + self.failure
    }

    pub fn in_flight(&self) -> usize {
        self.pending + self.started + self.retry
    }

    fn bump(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Started => self.started += 1,
            JobState::Retry => self.retry += 1,
            JobState::Success => self.success += 1,
            JobState::Failure => self.failure += 1,
        }
    }
}

/// What a worker needs to run the attempt it just started.
#[derive(Debug, Clone)]
pub struct AttemptTicket {
    pub job_id: JobId,
    pub payload: JobPayload,
    pub attempt: u32,
    pub max_attempts: u32,
}

type Slot = Arc<Mutex<JobRecord>>;

/// Job records keyed by id.
///
/// Design:
/// - One mutex per record: a write to one job never blocks reads of another.
/// - The map lock is held only to look up, insert or evict a slot, never
///   across a record mutation.
/// - Every mutation runs inside the record's lock and goes through a
///   `JobRecord` transition, so readers see either the old or the new
///   record, never a mix.
pub struct ResultStore {
    records: RwLock<HashMap<JobId, Slot>>,
    clock: Arc<dyn Clock>,
}

fn lock(slot: &Slot) -> MutexGuard<'_, JobRecord> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn slot(&self, job_id: JobId) -> Result<Slot, JobError> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&job_id)
            .cloned()
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))
    }

    /// Apply `f` to one record under its lock.
    pub fn update<T>(
        &self,
        job_id: JobId,
        f: impl FnOnce(&mut JobRecord) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let slot = self.slot(job_id)?;
        let mut record = lock(&slot);
        f(&mut record)
    }

    /// Register a freshly created record. Ids are never reused.
    pub fn insert(&self, record: JobRecord) -> Result<(), JobError> {
        let job_id = record.job_id();
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&job_id) {
            return Err(JobError::DuplicateJob(job_id));
        }
        map.insert(job_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    /// Drop a record (used when a submission could not be enqueued).
    pub fn remove(&self, job_id: JobId) -> Option<JobView> {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(&job_id).map(|slot| lock(&slot).view())
    }

    /// Read-only snapshot of a job.
    pub fn get_state(&self, job_id: JobId) -> Result<JobView, JobError> {
        let slot = self.slot(job_id)?;
        let view = lock(&slot).view();
        Ok(view)
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.slot(job_id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending/Retry -> Started.
    pub fn begin_attempt(&self, job_id: JobId) -> Result<AttemptTicket, JobError> {
        let now = self.clock.now();
        self.update(job_id, |record| {
            let attempt = record.start_attempt(now)?;
            Ok(AttemptTicket {
                job_id,
                payload: record.payload().clone(),
                attempt,
                max_attempts: record.max_attempts(),
            })
        })
    }

    /// Started -> Success.
    pub fn complete(&self, job_id: JobId, report: GenerationReport) -> Result<(), JobError> {
        let now = self.clock.now();
        self.update(job_id, |record| record.mark_succeeded(report, now))
    }

    /// Started -> Retry.
    pub fn retry(&self, job_id: JobId, reason: FailureReason) -> Result<(), JobError> {
        self.update(job_id, |record| record.schedule_retry(reason))
    }

    /// Started -> Failure.
    pub fn fail(&self, job_id: JobId, reason: FailureReason) -> Result<(), JobError> {
        let now = self.clock.now();
        self.update(job_id, |record| record.mark_failed(reason, now))
    }

    /// Started/Retry -> Failure without a new attempt.
    pub fn abandon(&self, job_id: JobId, reason: FailureReason) -> Result<(), JobError> {
        let now = self.clock.now();
        self.update(job_id, |record| record.abandon(reason, now))
    }

    fn slots(&self) -> Vec<(JobId, Slot)> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect()
    }

    pub fn counts_by_state(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for (_, slot) in self.slots() {
            counts.bump(lock(&slot).state());
        }
        counts
    }

    /// Drop finished records according to `policy`. Returns how many were removed.
    pub fn evict(&self, now: DateTime<Utc>, policy: &RetentionPolicy) -> usize {
        let max_age = chrono::Duration::from_std(policy.max_age).unwrap_or(chrono::Duration::MAX);

        // (id, finished_at) of terminal records, snapshotted one lock at a time
        let mut finished: Vec<(JobId, DateTime<Utc>)> = self
            .slots()
            .into_iter()
            .filter_map(|(id, slot)| {
                let record = lock(&slot);
                match (record.state().is_terminal(), record.finished_at()) {
                    (true, Some(at)) => Some((id, at)),
                    _ => None,
                }
            })
            .collect();
        finished.sort_by_key(|(_, at)| *at);

        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        let mut rest = Vec::with_capacity(finished.len());
        for (id, at) in finished {
            let expired = now.signed_duration_since(at) >= max_age;
            if expired && map.remove(&id).is_some() {
                removed += 1;
            } else {
                rest.push(id);
            }
        }

        if let Some(max_entries) = policy.max_entries {
            // rest is oldest-first
            for id in rest {
                if map.len() <= max_entries {
                    break;
                }
                if map.remove(&id).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobOutcome, PreferenceId, QuestionId};
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use std::time::Duration;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn store() -> (ResultStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(t0()));
        (ResultStore::new(clock.clone()), clock)
    }

    fn new_job(store: &ResultStore, max_attempts: u32) -> JobId {
        let id = JobId::from_ulid(Ulid::new());
        let record = JobRecord::new(
            id,
            JobPayload::new(1, None).unwrap(),
            max_attempts,
            store.clock().now(),
        );
        store.insert(record).unwrap();
        id
    }

    fn report() -> GenerationReport {
        GenerationReport::new(PreferenceId(1), vec![QuestionId(1)])
    }

    fn finish(store: &ResultStore, id: JobId) {
        store.begin_attempt(id).unwrap();
        store.complete(id, report()).unwrap();
    }

    #[test]
    fn unknown_job_is_not_found() {
        let (store, _) = store();
        let err = store.get_state(JobId::from_ulid(Ulid::new())).unwrap_err();
        assert!(matches!(err, JobError::JobNotFound(_)));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (store, _) = store();
        let id = new_job(&store, 3);
        let again = JobRecord::new(id, JobPayload::new(2, None).unwrap(), 3, t0());
        assert!(matches!(
            store.insert(again),
            Err(JobError::DuplicateJob(_))
        ));
        assert_eq!(store.get_state(id).unwrap().payload.preference_id(), PreferenceId(1));
    }

    #[test]
    fn begin_attempt_hands_out_ticket() {
        let (store, _) = store();
        let id = new_job(&store, 3);
        let ticket = store.begin_attempt(id).unwrap();
        assert_eq!(ticket.attempt, 1);
        assert_eq!(ticket.max_attempts, 3);
        assert_eq!(store.get_state(id).unwrap().state, JobState::Started);

        // Started job can't be started again by a second worker.
        assert!(matches!(
            store.begin_attempt(id),
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn terminal_snapshots_are_stable() {
        let (store, clock) = store();
        let id = new_job(&store, 3);
        finish(&store, id);
        let first = store.get_state(id).unwrap();
        clock.advance(chrono::Duration::minutes(5));
        for _ in 0..10 {
            assert_eq!(store.get_state(id).unwrap(), first);
        }
        assert!(matches!(first.result, Some(JobOutcome::Success(_))));
    }

    #[test]
    fn counts_follow_transitions() {
        let (store, _) = store();
        let a = new_job(&store, 3);
        let b = new_job(&store, 1);
        let _c = new_job(&store, 3);

        finish(&store, a);
        store.begin_attempt(b).unwrap();
        store.fail(b, FailureReason::execution("x")).unwrap();

        let counts = store.counts_by_state();
        assert_eq!(
            counts,
            StateCounts {
                pending: 1,
                started: 0,
                retry: 0,
                success: 1,
                failure: 1
            }
        );
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.in_flight(), 1);
    }

    #[test]
    fn abandon_fails_a_retrying_job() {
        let (store, _) = store();
        let id = new_job(&store, 3);
        store.begin_attempt(id).unwrap();
        store.retry(id, FailureReason::execution("x")).unwrap();
        store
            .abandon(
                id,
                FailureReason::QueueUnavailable {
                    message: "closed".into(),
                },
            )
            .unwrap();
        let view = store.get_state(id).unwrap();
        assert_eq!(view.state, JobState::Failure);
        assert_eq!(view.attempt_count, 1);
    }

    #[test]
    fn evicts_only_expired_terminal_records() {
        let (store, clock) = store();
        let done = new_job(&store, 3);
        let waiting = new_job(&store, 3);
        finish(&store, done);

        let policy = RetentionPolicy {
            max_age: Duration::from_secs(3600),
            max_entries: None,
        };
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(store.evict(clock.now(), &policy), 0);

        clock.advance(chrono::Duration::minutes(31));
        assert_eq!(store.evict(clock.now(), &policy), 1);
        assert!(!store.contains(done));
        assert!(store.contains(waiting));
    }

    #[test]
    fn max_entries_drops_oldest_finished_first() {
        let (store, clock) = store();
        let policy = RetentionPolicy {
            max_age: Duration::from_secs(24 * 3600),
            max_entries: Some(2),
        };

        let first = new_job(&store, 3);
        finish(&store, first);
        clock.advance(chrono::Duration::seconds(1));
        let second = new_job(&store, 3);
        finish(&store, second);
        clock.advance(chrono::Duration::seconds(1));
        let third = new_job(&store, 3);
        finish(&store, third);
        let running = new_job(&store, 3);
        store.begin_attempt(running).unwrap();

        assert_eq!(store.evict(clock.now(), &policy), 2);
        assert!(!store.contains(first));
        assert!(!store.contains(second));
        assert!(store.contains(third));
        assert!(store.contains(running));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_returns_last_view() {
        let (store, _) = store();
        let id = new_job(&store, 3);
        let view = store.remove(id).unwrap();
        assert_eq!(view.state, JobState::Pending);
        assert!(store.is_empty());
        assert!(store.remove(id).is_none());
    }
}
