use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::schemas::answer::SavedAnswer;
use crate::schemas::exam::Exam;

#[derive(Debug, Clone, Deserialize)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    #[serde(default)]
    pub student_id: Option<Uuid>,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub start_time: OffsetDateTime,
    /// Submission time; `None` while the attempt is still open.
    #[serde(default, deserialize_with = "crate::core::time::lenient::option::deserialize")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub total_possible_score: Option<f64>,
    #[serde(default)]
    pub answers: Vec<SavedAnswer>,
}

impl ExamAttempt {
    pub fn is_submitted(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Body of both the start and the resume endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExamStartResponse {
    pub exam: Exam,
    pub attempt: ExamAttempt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptResults {
    pub attempt: ExamAttempt,
    pub exam: Exam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnfinishedAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub start_time: OffsetDateTime,
    pub exam: Exam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedExam {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub exam_title: String,
    pub score: f64,
    #[serde(default)]
    pub total_possible_score: Option<f64>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(deserialize_with = "crate::core::time::lenient::deserialize")]
    pub end_time: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn results_attempt_carries_answers() {
        let results: AttemptResults = serde_json::from_value(json!({
            "attempt": {
                "id": "0f5f2d1e-58b3-4f0c-9d8e-2a7b1c3d4e01",
                "exam_id": "5b0c3f8e-2f7a-4a53-9a43-1f6f7e1e8c11",
                "student_id": "9a1e0c4d-6b2f-4e5a-8c7d-1f2e3d4c5b6a",
                "start_time": "2025-03-01T09:00:00",
                "end_time": "2025-03-01T09:08:30.500000+00:00",
                "score": 1.0,
                "total_possible_score": 3.0,
                "answers": [
                    {
                        "id": "11111111-58b3-4f0c-9d8e-2a7b1c3d4e01",
                        "attempt_id": "0f5f2d1e-58b3-4f0c-9d8e-2a7b1c3d4e01",
                        "question_id": "7d9e5c7a-1b55-4c11-8f2e-0f9c2b7c1a01",
                        "answer_data": "Paris"
                    }
                ]
            },
            "exam": {
                "id": "5b0c3f8e-2f7a-4a53-9a43-1f6f7e1e8c11",
                "title": "Geography",
                "questions": []
            }
        }))
        .unwrap();

        assert!(results.attempt.is_submitted());
        assert_eq!(results.attempt.start_time, datetime!(2025-03-01 09:00:00 UTC));
        assert_eq!(results.attempt.answers.len(), 1);
        assert_eq!(results.attempt.score, Some(1.0));
    }

    #[test]
    fn open_attempt_has_no_end_time() {
        let attempt: ExamAttempt = serde_json::from_value(json!({
            "id": "0f5f2d1e-58b3-4f0c-9d8e-2a7b1c3d4e01",
            "exam_id": "5b0c3f8e-2f7a-4a53-9a43-1f6f7e1e8c11",
            "start_time": "2025-03-01T09:00:00+00:00",
            "end_time": null,
            "score": null
        }))
        .unwrap();

        assert!(!attempt.is_submitted());
        assert!(attempt.answers.is_empty());
    }
}
