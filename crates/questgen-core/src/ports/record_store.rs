//! RecordStore port - users / preferences / questions の正本
//!
//! The store itself (and whatever database backs it) is an external
//! collaborator; jobs only need these four operations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    GeneratedQuestions, PreferenceId, PreferenceRecord, PreferenceStatus, QuestionId, UserId,
    UserRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl RecordStoreError {
    pub fn preference_not_found(id: PreferenceId) -> Self {
        RecordStoreError::NotFound {
            entity: "preference",
            id: id.get(),
        }
    }

    pub fn user_not_found(id: UserId) -> Self {
        RecordStoreError::NotFound {
            entity: "user",
            id: id.get(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordStoreError::NotFound { .. })
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_preference(&self, id: PreferenceId) -> Result<PreferenceRecord, RecordStoreError>;

    async fn read_user(&self, id: UserId) -> Result<UserRecord, RecordStoreError>;

    async fn set_preference_status(
        &self,
        id: PreferenceId,
        status: PreferenceStatus,
    ) -> Result<(), RecordStoreError>;

    /// Persist generated questions under a preference; returns their new ids in order.
    async fn save_questions(
        &self,
        preference_id: PreferenceId,
        questions: &GeneratedQuestions,
    ) -> Result<Vec<QuestionId>, RecordStoreError>;
}
