use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::schemas::answer::AnswerData;
use crate::schemas::exam::QuestionType;

/// Manual grading attached to a `text` or `image_upload` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub answer_id: Uuid,
    pub evaluated_by: Uuid,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub score_awarded: Option<f64>,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub created_at: OffsetDateTime,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatedAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub question_title: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub answer_data: Option<AnswerData>,
    #[serde(default)]
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatedResults {
    pub exam_title: String,
    pub score: f64,
    #[serde(default)]
    pub total_possible_score: Option<f64>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub submitted_at: OffsetDateTime,
    #[serde(default)]
    pub published_by: Option<String>,
    #[serde(default)]
    pub answers_with_evaluations: Vec<EvaluatedAnswer>,
}

impl EvaluatedResults {
    /// Answers to manually graded questions that nobody has evaluated yet.
    pub fn pending_evaluations(&self) -> usize {
        self.answers_with_evaluations
            .iter()
            .filter(|answer| !answer.question_type.is_auto_gradable() && answer.evaluation.is_none())
            .count()
    }
}
