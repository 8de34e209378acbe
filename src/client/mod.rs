mod error;
mod http;


use async_trait::async_trait;
use uuid::Uuid;

use crate::schemas::answer::{AnswerData, SavedAnswer};
use crate::schemas::attempt::{AttemptResults, CompletedExam, ExamStartResponse, UnfinishedAttempt};
use crate::schemas::evaluation::EvaluatedResults;
use crate::schemas::exam::AvailableExam;

pub use error::ApiError;
pub use http::HttpExamApi;

/// The student-facing endpoints of the exam backend.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Published exams visible to the signed-in student.
    async fn list_available_exams(&self) -> Result<Vec<AvailableExam>, ApiError>;

    /// Starts a new attempt, or returns the student's open attempt for this exam.
    async fn start_exam(&self, exam_id: Uuid) -> Result<ExamStartResponse, ApiError>;

    async fn resume_attempt(&self, attempt_id: Uuid) -> Result<ExamStartResponse, ApiError>;

    async fn fetch_answers(&self, attempt_id: Uuid) -> Result<Vec<SavedAnswer>, ApiError>;

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        answer: &AnswerData,
    ) -> Result<(), ApiError>;

    async fn submit_attempt(&self, attempt_id: Uuid) -> Result<(), ApiError>;

    async fn fetch_results(&self, attempt_id: Uuid) -> Result<AttemptResults, ApiError>;

    async fn list_unfinished_attempts(&self) -> Result<Vec<UnfinishedAttempt>, ApiError>;

    async fn list_completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError>;

    async fn fetch_evaluated_results(&self, attempt_id: Uuid)
        -> Result<EvaluatedResults, ApiError>;
}
