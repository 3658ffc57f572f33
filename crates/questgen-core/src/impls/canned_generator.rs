//! CannedGenerator - オフライン用の質問生成器
//!
//! Answers every request with the reference rental-preference question set,
//! after an optional delay, and can be told to fail its first N calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{GeneratedQuestions, PreferenceRecord};
use crate::ports::{GenerationError, QuestionGenerator};

const REFERENCE_QUESTIONS: &str = r#"{
  "questions": [
    {
      "question_type": "choice",
      "category": "experience",
      "importance": 5,
      "question": "For this trip, are you more focused on just getting from A to B, or do you see driving as part of the experience?",
      "options": ["Just transport", "Comfort matters", "I enjoy the driving experience"]
    },
    {
      "question_type": "choice",
      "category": "experience",
      "importance": 4,
      "question": "Some people feel tired quickly behind the wheel, others don't mind long drives at all. Which one describes you better?",
      "options": ["I get tired quickly", "Depends on the trip", "I can drive long hours comfortably"]
    },
    {
      "question_type": "choice",
      "category": "driving_feel",
      "importance": 5,
      "question": "Do you prefer a very quiet and smooth ride, or do you like to feel a bit of engine power and response?",
      "options": ["Quiet and smooth", "Balanced", "I enjoy power and response"]
    },
    {
      "question_type": "scale",
      "category": "psychology",
      "importance": 4,
      "question": "On a scale from 1 to 5, how stressful do you usually find driving in a new city?",
      "options": ["1", "2", "3", "4", "5"]
    },
    {
      "question_type": "choice",
      "category": "technology",
      "importance": 4,
      "question": "When it comes to in-car tech, which sounds more like you?",
      "options": ["I enjoy modern tech and screens", "I like some, not too much", "I prefer things simple"]
    }
  ]
}"#;

pub struct CannedGenerator {
    document: String,
    latency: Duration,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
}

impl CannedGenerator {
    pub fn new() -> Self {
        Self {
            document: REFERENCE_QUESTIONS.to_string(),
            latency: Duration::ZERO,
            remaining_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Answer with a different response document (decoded on every call).
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = document.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the first `n` calls with a request error.
    pub fn with_failures(self, n: u32) -> Self {
        self.remaining_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CannedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionGenerator for CannedGenerator {
    async fn generate(
        &self,
        _preference: &PreferenceRecord,
        _user_context: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<GeneratedQuestions, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if let Ok(left) = failed {
            return Err(GenerationError::Request(format!(
                "intentional failure (left={left})"
            )));
        }

        Ok(GeneratedQuestions::from_json(&self.document)?)
    }
}
