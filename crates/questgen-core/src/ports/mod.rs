//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。外部の協力者（broker, record store,
//! AI generator）と時刻・ID 生成をここで trait として切り出し、
//! 実装の詳細は impls/ 側に置く。

pub mod broker;
pub mod clock;
pub mod generator;
pub mod id_generator;
pub mod record_store;

pub use self::broker::Broker;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::generator::{GenerationError, QuestionGenerator};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::record_store::{RecordStore, RecordStoreError};
