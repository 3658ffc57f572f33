//! questgen-core
//!
//! Background jobs that generate preference questions: submit, queue, run
//! with retries and a time limit, poll by handle.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, payload, state, job, outcome, questions, records, errors）
//! - **ports**: 抽象化レイヤー（Broker, RecordStore, QuestionGenerator, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryBroker, InMemoryRecordStore, CannedGenerator）
//! - **policy**: RetryPolicy と Backoff（純粋な判定関数）
//! - **store**: ResultStore と retention
//! - **app**: Gateway, WorkerPool, Sweeper, JobApi, JobSystem
//! - **config**: `questgen.toml` + 環境変数
//! - **observability**: tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod policy;
pub mod ports;
pub mod store;

pub use app::{JobApi, JobStatusResponse, JobSystem};
pub use config::{ConfigError, QuestgenConfig};
