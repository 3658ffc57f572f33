//! App - アプリケーション層
//!
//! ports を組み合わせてジョブの流れを作る。
//!
//! # 主要コンポーネント
//! - **Gateway**: 入力検証 → PENDING レコード作成 → enqueue
//! - **JobRunner / WorkerPool**: dequeue → 実行（時間制限つき）→ 判定 → 記録
//! - **Sweeper**: 終了済みジョブの retention
//! - **JobApi**: submit / poll の表面
//! - **JobSystem**: 上記のワイヤリング

pub mod api;
pub mod gateway;
pub mod sweeper;
pub mod system;
pub mod worker;

pub use self::api::{JobApi, JobStatusResponse};
pub use self::gateway::Gateway;
pub use self::sweeper::Sweeper;
pub use self::system::{JobSystem, connect_broker, connect_result_backend};
pub use self::worker::{ExecutionLimits, JobRunner, WorkerPool};
