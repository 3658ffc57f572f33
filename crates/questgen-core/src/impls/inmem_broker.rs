//! In-memory broker (`memory://`).

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{JobError, JobId};
use crate::ports::Broker;

/// Endpoint scheme served by [`InMemoryBroker`].
pub const MEMORY_SCHEME: &str = "memory://";

struct BrokerState {
    /// Ready queue (JobIds only).
    ready: VecDeque<JobId>,
    closed: bool,
}

/// FIFO broker living in this process.
///
/// - `enqueue` pushes to the back and wakes one waiter.
/// - `dequeue` pops from the front; each id goes to exactly one caller.
/// - After `close`, enqueue fails and dequeue returns `None`, even if ids are
///   still queued (those jobs stay PENDING/RETRY in the result store).
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    notify: Notify,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState {
                ready: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, job_id: JobId) -> Result<(), JobError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(JobError::QueueUnavailable("broker is closed".to_string()));
            }
            state.ready.push_back(job_id);
        }
        // Notify outside the lock
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<JobId>, JobError> {
        loop {
            // 先に waiter として登録してから状態を見る（通知の取りこぼし防止）
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Ok(None);
                }
                if let Some(job_id) = state.ready.pop_front() {
                    return Ok(Some(job_id));
                }
            }

            notified.await;
        }
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use ulid::Ulid;

    fn new_id() -> JobId {
        JobId::from_ulid(Ulid::new())
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let broker = InMemoryBroker::new();
        let ids: Vec<JobId> = (0..5).map(|_| new_id()).collect();
        for id in &ids {
            broker.enqueue(*id).await.unwrap();
        }
        assert_eq!(broker.len().await, 5);

        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(broker.dequeue().await.unwrap().unwrap());
        }
        assert_eq!(out, ids);
        assert!(broker.is_empty().await);
    }

    #[tokio::test]
    async fn enqueue_wakes_waiting_dequeue() {
        let broker = Arc::new(InMemoryBroker::new());
        let id = new_id();

        let waiter = tokio::spawn({
            let broker = Arc::clone(&broker);
            async move { broker.dequeue().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        broker.enqueue(id).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(id));
    }

    #[tokio::test]
    async fn close_releases_every_waiter() {
        let broker = Arc::new(InMemoryBroker::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let broker = Arc::clone(&broker);
                tokio::spawn(async move { broker.dequeue().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        broker.close().await;

        for w in waiters {
            let got = tokio::time::timeout(Duration::from_secs(1), w)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test]
    async fn closed_broker_rejects_enqueue() {
        let broker = InMemoryBroker::new();
        broker.close().await;
        let err = broker.enqueue(new_id()).await.unwrap_err();
        assert!(matches!(err, JobError::QueueUnavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_never_share_an_item() {
        let broker = Arc::new(InMemoryBroker::new());
        let total = 200;

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Ok(Some(id)) = broker.dequeue().await {
                        seen.push(id);
                    }
                    seen
                })
            })
            .collect();

        let mut sent = HashSet::new();
        for _ in 0..total {
            let id = new_id();
            sent.insert(id);
            broker.enqueue(id).await.unwrap();
        }

        // drain, then close so consumers exit
        while !broker.is_empty().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        broker.close().await;

        let mut received = Vec::new();
        for c in consumers {
            received.extend(c.await.unwrap());
        }
        let unique: HashSet<JobId> = received.iter().copied().collect();
        assert_eq!(received.len(), total);
        assert_eq!(unique, sent);
    }
}
