//! Generated questions and the report a successful job returns.

use serde::{Deserialize, Serialize};

use super::ids::{PreferenceId, QuestionId};

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 5;

/// One question proposed by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(default = "default_question_type")]
    pub question_type: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub question: String,

    #[serde(default)]
    pub options: Vec<String>,

    /// 1 = low, 5 = critical.
    #[serde(default = "default_importance")]
    pub importance: u8,
}

fn default_question_type() -> String {
    "choice".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_importance() -> u8 {
    MIN_IMPORTANCE
}

impl GeneratedQuestion {
    pub fn new(category: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            question_type: default_question_type(),
            category: category.into(),
            question: question.into(),
            options: Vec::new(),
            importance: default_importance(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        self
    }

    pub fn with_question_type(mut self, question_type: impl Into<String>) -> Self {
        self.question_type = question_type.into();
        self
    }
}

/// The generator's output for one preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestions {
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

/// Shape used only while decoding: importance may arrive as any integer.
#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default = "default_question_type")]
    question_type: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    importance: Option<i64>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

impl GeneratedQuestions {
    pub fn new(questions: Vec<GeneratedQuestion>) -> Self {
        Self { questions }
    }

    /// Decode a `{"questions": [...]}` response document.
    ///
    /// Missing fields take their defaults and importance is clamped to 1..=5.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDocument = serde_json::from_str(document)?;
        let questions = raw
            .questions
            .into_iter()
            .map(|q| GeneratedQuestion {
                question_type: q.question_type,
                category: q.category,
                question: q.question,
                options: q.options.unwrap_or_default(),
                importance: q
                    .importance
                    .unwrap_or(i64::from(MIN_IMPORTANCE))
                    .clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE))
                    as u8,
            })
            .collect();
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Result stored on a `SUCCESS` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Always `"success"`; kept for callers that switch on it.
    pub status: String,
    pub preference_id: PreferenceId,
    pub questions_created: usize,
    pub question_ids: Vec<QuestionId>,
}

impl GenerationReport {
    pub fn new(preference_id: PreferenceId, question_ids: Vec<QuestionId>) -> Self {
        Self {
            status: "success".to_string(),
            preference_id,
            questions_created: question_ids.len(),
            question_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_applies_defaults() {
        let doc = r#"{"questions": [{"question": "Quiet or powerful?"}]}"#;
        let parsed = GeneratedQuestions::from_json(doc).unwrap();
        assert_eq!(parsed.len(), 1);
        let q = &parsed.questions[0];
        assert_eq!(q.question_type, "choice");
        assert_eq!(q.category, "general");
        assert_eq!(q.importance, 1);
        assert!(q.options.is_empty());
    }

    #[test]
    fn from_json_clamps_importance() {
        let doc = r#"{"questions": [
            {"question": "a", "importance": 9},
            {"question": "b", "importance": -3},
            {"question": "c", "importance": 4, "options": ["x", "y"]}
        ]}"#;
        let parsed = GeneratedQuestions::from_json(doc).unwrap();
        let importance: Vec<u8> = parsed.questions.iter().map(|q| q.importance).collect();
        assert_eq!(importance, vec![5, 1, 4]);
        assert_eq!(parsed.questions[2].options, vec!["x", "y"]);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(GeneratedQuestions::from_json("not json").is_err());
        assert!(GeneratedQuestions::from_json(r#"{"questions": 3}"#).is_err());
    }

    #[test]
    fn report_counts_ids() {
        let report = GenerationReport::new(PreferenceId(3), vec![QuestionId(10), QuestionId(11)]);
        assert_eq!(report.questions_created, 2);
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["preference_id"], 3);
        assert_eq!(v["question_ids"], serde_json::json!([10, 11]));
    }
}
