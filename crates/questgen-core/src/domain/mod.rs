//! Domain model (ids, state machine, payload, outcomes, records).
//!
//! Architecture-agnostic: nothing here knows about queues, workers or locks.

pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod payload;
pub mod questions;
pub mod records;
pub mod state;

pub use errors::{ErrorKind, JobError};
pub use ids::{JobId, ParseJobIdError, PreferenceId, QuestionId, UserId};
pub use job::{JobRecord, JobView};
pub use outcome::{FailureDetail, FailureReason, JobOutcome};
pub use payload::{JobPayload, TASK_NAME};
pub use questions::{GeneratedQuestion, GeneratedQuestions, GenerationReport};
pub use records::{PreferenceRecord, PreferenceStatus, UserRecord};
pub use state::JobState;
