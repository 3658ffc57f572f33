//! Sweeper - 終了済みジョブの掃除
//!
//! # フロー
//! 1. 一定間隔で `ResultStore::evict()` を呼ぶ
//! 2. shutdown が来たら抜ける

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::store::{ResultStore, RetentionPolicy};

pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(store: Arc<ResultStore>, policy: RetentionPolicy, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            // first tick completes immediately
            ticks.tick().await;
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticks.tick() => {
                        let now = store.clock().now();
                        let removed = store.evict(now, &policy);
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "evicted finished jobs");
                        }
                    }
                }
            }
        });
        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "sweeper task panicked");
        }
    }
}
