use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::client::{ApiError, ExamApi};
use crate::core::retry::RetryPolicy;
use crate::core::time::{format_offset, Clock};
use crate::schemas::answer::{AnswerData, SavedAnswer};
use crate::schemas::attempt::{AttemptResults, CompletedExam, ExamStartResponse, UnfinishedAttempt};
use crate::schemas::evaluation::EvaluatedResults;
use crate::schemas::exam::AvailableExam;
use crate::services::exam_session::SessionDeps;

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

/// Wall clock that advances with Tokio's (pausable) time.
pub(crate) struct TokioClock {
    origin: OffsetDateTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub(crate) fn starting_at(origin: OffsetDateTime) -> Self {
        Self { origin, started: tokio::time::Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.origin + self.started.elapsed()
    }
}

pub(crate) fn session_deps(api: Arc<FakeExamApi>, clock: Arc<dyn Clock>) -> SessionDeps {
    SessionDeps {
        api,
        clock,
        tick: Duration::from_secs(1),
        result_retry: RetryPolicy::new(3, Duration::from_millis(350)),
        flush_timeout: Duration::from_secs(5),
    }
}

/// Question payload as the backend sends it to a student.
pub(crate) fn question(id: Uuid, kind: &str, options: &[&str], correct: Value) -> Value {
    json!({
        "id": id,
        "title": format!("Question {kind}"),
        "type": kind,
        "options": options,
        "correct_answers": correct,
        "max_score": 1,
    })
}

#[derive(Default)]
struct FakeState {
    exam_title: String,
    questions: Vec<Value>,
    duration_minutes: Option<i64>,
    window_end: Option<OffsetDateTime>,
    attempt_start: Option<OffsetDateTime>,
    time_remaining_hint: Option<i64>,
    auto_submitted: bool,
    submitted: bool,

    stored: HashMap<Uuid, AnswerData>,
    save_log: Vec<(Uuid, AnswerData)>,
    save_delays: Vec<(AnswerData, Duration)>,
    fail_saves: bool,
    fail_answer_fetch: bool,

    submit_calls: u32,
    submit_delay: Duration,
    submit_error: Option<(u16, String)>,

    results_calls: u32,
    results_failures_left: u32,
}

/// Scripted in-memory backend for one exam and one attempt.
pub(crate) struct FakeExamApi {
    exam_id: Uuid,
    attempt_id: Uuid,
    state: Mutex<FakeState>,
}

impl FakeExamApi {
    pub(crate) fn new() -> Self {
        Self {
            exam_id: Uuid::new_v4(),
            attempt_id: Uuid::new_v4(),
            state: Mutex::new(FakeState {
                exam_title: "Fixture exam".to_string(),
                duration_minutes: Some(10),
                ..FakeState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn exam_id(&self) -> Uuid {
        self.exam_id
    }

    pub(crate) fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub(crate) fn with_questions(self, questions: Vec<Value>) -> Self {
        self.lock().questions = questions;
        self
    }

    pub(crate) fn with_duration(self, minutes: Option<i64>) -> Self {
        self.lock().duration_minutes = minutes;
        self
    }

    pub(crate) fn with_window_end(self, end: OffsetDateTime) -> Self {
        self.lock().window_end = Some(end);
        self
    }

    pub(crate) fn started_at(self, start: OffsetDateTime) -> Self {
        self.lock().attempt_start = Some(start);
        self
    }

    pub(crate) fn with_remaining_hint(self, seconds: i64) -> Self {
        self.lock().time_remaining_hint = Some(seconds);
        self
    }

    /// Resume reports the attempt as closed by the server, as after the exam window ends.
    pub(crate) fn auto_submitted(self) -> Self {
        {
            let mut state = self.lock();
            state.auto_submitted = true;
            state.submitted = true;
        }
        self
    }

    pub(crate) fn mark_submitted(&self) {
        self.lock().submitted = true;
    }

    pub(crate) fn seed_answer(&self, question_id: Uuid, value: AnswerData) {
        self.lock().stored.insert(question_id, value);
    }

    pub(crate) fn delay_saves_of(&self, value: AnswerData, delay: Duration) {
        self.lock().save_delays.push((value, delay));
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    pub(crate) fn fail_answer_fetch(&self, fail: bool) {
        self.lock().fail_answer_fetch = fail;
    }

    pub(crate) fn fail_submit(&self, status: u16, detail: &str) {
        self.lock().submit_error = Some((status, detail.to_string()));
    }

    pub(crate) fn clear_submit_failure(&self) {
        self.lock().submit_error = None;
    }

    pub(crate) fn delay_submit(&self, delay: Duration) {
        self.lock().submit_delay = delay;
    }

    /// The next `times` result fetches answer 404, as while the submission is still settling.
    pub(crate) fn fail_results_times(&self, times: u32) {
        self.lock().results_failures_left = times;
    }

    pub(crate) fn stored_answer(&self, question_id: Uuid) -> Option<AnswerData> {
        self.lock().stored.get(&question_id).cloned()
    }

    pub(crate) fn save_log(&self) -> Vec<(Uuid, AnswerData)> {
        self.lock().save_log.clone()
    }

    pub(crate) fn submit_calls(&self) -> u32 {
        self.lock().submit_calls
    }

    pub(crate) fn results_calls(&self) -> u32 {
        self.lock().results_calls
    }

    fn exam_json(&self, state: &FakeState, with_key: bool) -> Value {
        let questions: Vec<Value> = state
            .questions
            .iter()
            .map(|question| {
                let mut question = question.clone();
                if !with_key {
                    if let Some(map) = question.as_object_mut() {
                        map.remove("correct_answers");
                    }
                }
                question
            })
            .collect();

        json!({
            "id": self.exam_id,
            "title": state.exam_title,
            "end_time": state.window_end.map(format_offset),
            "duration_minutes": state.duration_minutes,
            "is_published": true,
            "questions": questions,
            "time_remaining_seconds": state.time_remaining_hint,
        })
    }

    fn attempt_json(&self, state: &FakeState, start: OffsetDateTime) -> Value {
        json!({
            "id": self.attempt_id,
            "exam_id": self.exam_id,
            "start_time": format_offset(start),
            "end_time": state.submitted.then(|| format_offset(start)),
        })
    }

    fn start_response(&self) -> Result<ExamStartResponse, ApiError> {
        let mut state = self.lock();
        let start = *state.attempt_start.get_or_insert_with(OffsetDateTime::now_utc);
        let mut exam = self.exam_json(&state, false);
        if state.auto_submitted {
            exam = json!({
                "id": self.exam_id,
                "title": state.exam_title,
                "auto_submitted": true,
            });
        }
        let attempt = self.attempt_json(&state, start);
        decode(json!({ "exam": exam, "attempt": attempt }))
    }

    fn score(&self, state: &FakeState) -> f64 {
        state
            .questions
            .iter()
            .filter(|question| {
                let Some(id) = question.get("id").and_then(Value::as_str) else {
                    return false;
                };
                let Ok(id) = id.parse::<Uuid>() else {
                    return false;
                };
                let Some(correct) = question.get("correct_answers").filter(|value| !value.is_null())
                else {
                    return false;
                };
                let mut expected = crate::schemas::answer::value_strings(correct);
                let mut given =
                    state.stored.get(&id).map(AnswerData::option_strings).unwrap_or_default();
                expected.sort();
                given.sort();
                expected == given
            })
            .count() as f64
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode { status: 200, source })
}

#[async_trait]
impl ExamApi for FakeExamApi {
    async fn list_available_exams(&self) -> Result<Vec<AvailableExam>, ApiError> {
        let state = self.lock();
        let mut exam = self.exam_json(&state, false);
        if let Some(map) = exam.as_object_mut() {
            map.insert("is_active".to_string(), json!(true));
        }
        decode(json!([exam]))
    }

    async fn start_exam(&self, exam_id: Uuid) -> Result<ExamStartResponse, ApiError> {
        if exam_id != self.exam_id {
            return Err(ApiError::status(404, "Exam not found"));
        }
        self.start_response()
    }

    async fn resume_attempt(&self, attempt_id: Uuid) -> Result<ExamStartResponse, ApiError> {
        if attempt_id != self.attempt_id {
            return Err(ApiError::status(404, "Attempt not found"));
        }
        self.start_response()
    }

    async fn fetch_answers(&self, _attempt_id: Uuid) -> Result<Vec<SavedAnswer>, ApiError> {
        let state = self.lock();
        if state.fail_answer_fetch {
            return Err(ApiError::status(500, "Internal Server Error"));
        }
        let rows: Vec<Value> = state
            .stored
            .iter()
            .map(|(question_id, value)| json!({ "question_id": question_id, "answer_data": value }))
            .collect();
        decode(Value::Array(rows))
    }

    async fn save_answer(
        &self,
        _attempt_id: Uuid,
        question_id: Uuid,
        answer: &AnswerData,
    ) -> Result<(), ApiError> {
        let delay = {
            let state = self.lock();
            state
                .save_delays
                .iter()
                .find(|(value, _)| value == answer)
                .map(|(_, delay)| *delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_saves {
            return Err(ApiError::status(503, "Service Unavailable"));
        }
        if state.submitted {
            return Err(ApiError::status(400, "Exam already submitted"));
        }
        state.save_log.push((question_id, answer.clone()));
        state.stored.insert(question_id, answer.clone());
        Ok(())
    }

    async fn submit_attempt(&self, _attempt_id: Uuid) -> Result<(), ApiError> {
        let delay = {
            let mut state = self.lock();
            state.submit_calls += 1;
            state.submit_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some((status, detail)) = state.submit_error.clone() {
            return Err(ApiError::status(status, detail));
        }
        if state.submitted {
            return Err(ApiError::status(400, "Exam already submitted"));
        }
        state.submitted = true;
        Ok(())
    }

    async fn fetch_results(&self, _attempt_id: Uuid) -> Result<AttemptResults, ApiError> {
        let mut state = self.lock();
        state.results_calls += 1;
        if state.results_failures_left > 0 {
            state.results_failures_left -= 1;
            return Err(ApiError::status(404, "Attempt not found"));
        }
        if !state.submitted {
            return Err(ApiError::status(400, "Exam not submitted"));
        }

        let start = state.attempt_start.unwrap_or_else(OffsetDateTime::now_utc);
        let mut attempt = self.attempt_json(&state, start);
        let answers: Vec<Value> = state
            .stored
            .iter()
            .map(|(question_id, value)| json!({ "question_id": question_id, "answer_data": value }))
            .collect();
        attempt["answers"] = Value::Array(answers);
        attempt["score"] = json!(self.score(&state));
        attempt["total_possible_score"] = json!(state.questions.len() as f64);

        decode(json!({ "attempt": attempt, "exam": self.exam_json(&state, true) }))
    }

    async fn list_unfinished_attempts(&self) -> Result<Vec<UnfinishedAttempt>, ApiError> {
        Ok(Vec::new())
    }

    async fn list_completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError> {
        Ok(Vec::new())
    }

    async fn fetch_evaluated_results(
        &self,
        _attempt_id: Uuid,
    ) -> Result<EvaluatedResults, ApiError> {
        Err(ApiError::status(404, "Attempt not found"))
    }
}
