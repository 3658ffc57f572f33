//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBroker**: `memory://` の配送キュー
//! - **InMemoryRecordStore**: users / preferences / questions
//! - **CannedGenerator**: 固定の質問セットを返す生成器

pub mod canned_generator;
pub mod inmem_broker;
pub mod inmem_records;

pub use self::canned_generator::CannedGenerator;
pub use self::inmem_broker::{InMemoryBroker, MEMORY_SCHEME};
pub use self::inmem_records::{InMemoryRecordStore, StoredQuestion};
