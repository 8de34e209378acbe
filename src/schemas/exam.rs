use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::schemas::answer::AnswerData;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoiceError {
    #[error("{0:?} is not one of the options")]
    UnknownOption(String),
    #[error("pick at least one option")]
    NothingChosen,
    #[error("{0} questions take an option, not a file")]
    NotAnOption(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    Text,
    ImageUpload,
    #[serde(other)]
    Other,
}

impl QuestionType {
    /// Choice questions are graded by comparing against the stored correct answer.
    pub fn is_auto_gradable(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultiChoice => "multi_choice",
            QuestionType::Text => "text",
            QuestionType::ImageUpload => "image_upload",
            QuestionType::Other => "other",
        }
    }
}

/// A question as the student sees it. `correct_answers` is only populated in result payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub correct_answers: Option<Value>,
    #[serde(default = "default_max_score")]
    pub max_score: i64,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    #[serde(default, deserialize_with = "crate::core::time::lenient::option::deserialize")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "crate::core::time::lenient::option::deserialize")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub published_by: Option<String>,
    #[serde(default)]
    pub target_candidates: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub time_remaining_seconds: Option<i64>,
    #[serde(default)]
    pub auto_submitted: bool,
}

impl Question {
    /// Option labels for choice questions. Accepts a list of labels or an object keyed by label.
    pub fn option_labels(&self) -> Vec<String> {
        match &self.options {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Choice answers must name listed options; a question without listed options accepts any.
    /// Other question types are not checked.
    pub fn check_choice(&self, answer: &AnswerData) -> Result<(), ChoiceError> {
        let chosen: Vec<&str> = match (self.kind, answer) {
            (QuestionType::SingleChoice, AnswerData::Text(value)) => vec![value.as_str()],
            (QuestionType::MultiChoice, AnswerData::Choices(values)) => {
                values.iter().map(String::as_str).collect()
            }
            (QuestionType::MultiChoice, AnswerData::Text(value)) => vec![value.as_str()],
            (QuestionType::SingleChoice | QuestionType::MultiChoice, _) => {
                return Err(ChoiceError::NotAnOption(self.kind.as_str()));
            }
            _ => return Ok(()),
        };

        if chosen.iter().all(|value| value.trim().is_empty()) {
            return Err(ChoiceError::NothingChosen);
        }

        let labels = self.option_labels();
        if labels.is_empty() {
            return Ok(());
        }
        match chosen.into_iter().find(|value| !labels.iter().any(|label| label == value)) {
            Some(unknown) => Err(ChoiceError::UnknownOption(unknown.to_string())),
            None => Ok(()),
        }
    }
}

/// Entry of the student's exam list, with the server's view of the exam window.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableExam {
    #[serde(flatten)]
    pub exam: Exam,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_upcoming: bool,
    #[serde(default)]
    pub is_expired: bool,
}

impl AvailableExam {
    pub fn window_label(&self) -> &'static str {
        if self.is_expired {
            "closed"
        } else if self.is_upcoming {
            "upcoming"
        } else if self.is_active {
            "open"
        } else {
            "unknown"
        }
    }
}

impl Exam {
    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }
}

fn default_max_score() -> i64 {
    1
}
