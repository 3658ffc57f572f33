//! Job payload: what a job was asked to do.

use serde::{Deserialize, Serialize};

use super::errors::JobError;
use super::ids::PreferenceId;

/// Name the job type is registered and logged under.
pub const TASK_NAME: &str = "generate_preference_questions";

/// Immutable input of a question-generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    preference_id: PreferenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_context: Option<String>,
}

impl JobPayload {
    /// Validate raw submission input.
    ///
    /// Preference ids are positive; a supplied context must contain non-whitespace text.
    pub fn new(preference_id: i64, user_context: Option<String>) -> Result<Self, JobError> {
        if preference_id <= 0 {
            return Err(JobError::Validation(format!(
                "preference_id must be positive, got {preference_id}"
            )));
        }
        if let Some(ctx) = user_context.as_deref()
            && ctx.trim().is_empty()
        {
            return Err(JobError::Validation(
                "user_context must be non-empty text when supplied".to_string(),
            ));
        }
        Ok(Self {
            preference_id: PreferenceId(preference_id),
            user_context,
        })
    }

    pub fn preference_id(&self) -> PreferenceId {
        self.preference_id
    }

    pub fn user_context(&self) -> Option<&str> {
        self.user_context.as_deref()
    }

    pub(crate) fn with_default_context(mut self, context: String) -> Self {
        if self.user_context.is_none() {
            self.user_context = Some(context);
        }
        self
    }
}
