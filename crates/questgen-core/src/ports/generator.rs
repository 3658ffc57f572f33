//! QuestionGenerator port - AI による質問生成
//!
//! The real model call is out of this crate's hands: it can be slow, it can
//! fail, and it has no latency bound. Workers wrap every call in their own
//! execution window.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{GeneratedQuestions, PreferenceRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        GenerationError::MalformedResponse(e.to_string())
    }
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Produce questions for one preference.
    ///
    /// `cancel` fires when the worker's soft time limit passes or the attempt
    /// is abandoned; a cooperative generator should return promptly once it
    /// sees it.
    async fn generate(
        &self,
        preference: &PreferenceRecord,
        user_context: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<GeneratedQuestions, GenerationError>;
}
