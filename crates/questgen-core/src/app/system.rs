//! JobSystem - 起動とワイヤリング
//!
//! Builds one result store, one broker, the gateway, the worker pool and the
//! retention sweeper from a validated config, and passes them explicitly to
//! whoever needs them. Must be started inside a tokio runtime.

use std::sync::Arc;

use tracing::info;

use super::{ExecutionLimits, Gateway, JobApi, JobRunner, Sweeper, WorkerPool};
use crate::config::{ConfigError, QuestgenConfig};
use crate::impls::{InMemoryBroker, MEMORY_SCHEME};
use crate::ports::{Broker, Clock, QuestionGenerator, RecordStore, SystemClock, UlidGenerator};
use crate::store::ResultStore;

/// Open the broker named by `url`.
pub fn connect_broker(url: &str) -> Result<Arc<dyn Broker>, ConfigError> {
    if url.starts_with(MEMORY_SCHEME) {
        Ok(Arc::new(InMemoryBroker::new()))
    } else {
        Err(ConfigError::Invalid(format!("unsupported broker endpoint {url:?}")))
    }
}

/// Open the result store named by `url`.
pub fn connect_result_backend(url: &str, clock: Arc<dyn Clock>) -> Result<Arc<ResultStore>, ConfigError> {
    if url.starts_with(MEMORY_SCHEME) {
        Ok(Arc::new(ResultStore::new(clock)))
    } else {
        Err(ConfigError::Invalid(format!("unsupported result backend {url:?}")))
    }
}

pub struct JobSystem {
    api: JobApi,
    gateway: Arc<Gateway>,
    store: Arc<ResultStore>,
    broker: Arc<dyn Broker>,
    pool: WorkerPool,
    sweeper: Sweeper,
}

impl JobSystem {
    pub fn start(
        config: &QuestgenConfig,
        records: Arc<dyn RecordStore>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Result<Self, ConfigError> {
        Self::start_with_clock(config, records, generator, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: &QuestgenConfig,
        records: Arc<dyn RecordStore>,
        generator: Arc<dyn QuestionGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = connect_result_backend(&config.result_backend, Arc::clone(&clock))?;
        let broker = connect_broker(&config.broker_url)?;

        let policy = config.retry_policy();
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&store),
            Arc::clone(&broker),
            Arc::clone(&records),
            Arc::new(UlidGenerator::new(clock)),
            policy.max_attempts,
        ));
        let limits: ExecutionLimits = config.execution_limits();
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::clone(&broker),
            records,
            generator,
            policy,
            limits,
        ));
        let pool = WorkerPool::spawn(config.workers, runner);
        let sweeper = Sweeper::spawn(
            Arc::clone(&store),
            config.retention_policy(),
            config.sweep_interval(),
        );

        info!(
            workers = config.workers,
            max_attempts = config.max_attempts,
            timeout_secs = config.execution_timeout_secs,
            broker = %config.broker_url,
            "job system started"
        );

        Ok(Self {
            api: JobApi::new(Arc::clone(&gateway), Arc::clone(&store)),
            gateway,
            store,
            broker,
            pool,
            sweeper,
        })
    }

    pub fn api(&self) -> &JobApi {
        &self.api
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    /// Close the broker, stop the sweeper and wait for workers to finish
    /// their current job.
    ///
    /// Jobs still queued stay PENDING/RETRY. Retries waiting on a backoff
    /// delay are failed with a queue-unavailable reason before this returns.
    pub async fn shutdown(self) {
        self.broker.close().await;
        self.pool.shutdown_and_join().await;
        self.sweeper.shutdown_and_join().await;
        info!("job system stopped");
    }
}
