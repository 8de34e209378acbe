use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::{extract_detail, ApiError};
use super::ExamApi;
use crate::auth::AuthSession;
use crate::core::config::Settings;
use crate::schemas::answer::{AnswerData, SaveAnswerRequest, SavedAnswer};
use crate::schemas::attempt::{AttemptResults, CompletedExam, ExamStartResponse, UnfinishedAttempt};
use crate::schemas::evaluation::EvaluatedResults;
use crate::schemas::exam::AvailableExam;
use crate::schemas::user::{TokenResponse, UserLogin, UserProfile};

#[derive(Debug, Clone)]
pub struct HttpExamApi {
    client: Client,
    base_url: String,
    session: Option<AuthSession>,
}

impl HttpExamApi {
    pub fn from_settings(settings: &Settings, session: AuthSession) -> Result<Self> {
        Self::new(&settings.api().base_url, settings.api().timeout(), session)
    }

    pub fn new(base_url: &str, timeout: Duration, session: AuthSession) -> Result<Self> {
        Self::build(base_url, timeout, Some(session))
    }

    /// Client without credentials, used to sign in.
    pub fn anonymous(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, timeout, None)
    }

    fn build(base_url: &str, timeout: Duration, session: Option<AuthSession>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .build()
            .context("Failed to build exam API HTTP client")?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), session })
    }

    /// Exchanges an email and password for a token, then loads the account it belongs to.
    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
        now: OffsetDateTime,
    ) -> Result<AuthSession, ApiError> {
        let form = UserLogin { username, password };
        let token: TokenResponse =
            self.fetch_json(self.unauthenticated(Method::POST, "/token").form(&form)).await?;
        self.with_profile(AuthSession::new(token.access_token, remember_me, now)).await
    }

    /// Accepts a token issued elsewhere once the server confirms whose it is.
    pub async fn adopt_token(
        &self,
        token: impl Into<String>,
        remember_me: bool,
        now: OffsetDateTime,
    ) -> Result<AuthSession, ApiError> {
        self.with_profile(AuthSession::new(token, remember_me, now)).await
    }

    async fn with_profile(&self, session: AuthSession) -> Result<AuthSession, ApiError> {
        let profile: UserProfile = self
            .fetch_json(
                self.unauthenticated(Method::GET, "/me").header(AUTHORIZATION, session.bearer()),
            )
            .await?;
        tracing::info!(user_id = %profile.id, role = %profile.role, "Signed in");
        Ok(session.with_user(profile))
    }

    fn unauthenticated(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "Sending exam API request");
        self.client.request(method, url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.unauthenticated(method, path);
        match &self.session {
            Some(session) => builder.header(AUTHORIZATION, session.bearer()),
            None => builder,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = checked(builder.send().await?).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { status, source })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        checked(builder.send().await?).await?;
        Ok(())
    }
}

async fn checked(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    });

    Err(ApiError::Status { status: status.as_u16(), detail })
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn list_available_exams(&self) -> Result<Vec<AvailableExam>, ApiError> {
        self.fetch_json(self.request(Method::GET, "/student/exams/")).await
    }

    async fn start_exam(&self, exam_id: Uuid) -> Result<ExamStartResponse, ApiError> {
        self.fetch_json(self.request(Method::POST, &format!("/student/exams/{exam_id}/start")))
            .await
    }

    async fn resume_attempt(&self, attempt_id: Uuid) -> Result<ExamStartResponse, ApiError> {
        self.fetch_json(
            self.request(Method::POST, &format!("/student/attempts/{attempt_id}/resume")),
        )
        .await
    }

    async fn fetch_answers(&self, attempt_id: Uuid) -> Result<Vec<SavedAnswer>, ApiError> {
        self.fetch_json(
            self.request(Method::GET, &format!("/student/attempts/{attempt_id}/answers")),
        )
        .await
    }

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        answer: &AnswerData,
    ) -> Result<(), ApiError> {
        let answer_data = answer.to_wire();
        let payload = SaveAnswerRequest { question_id, answer_data: &answer_data };
        self.send(
            self.request(Method::POST, &format!("/student/attempts/{attempt_id}/save-answer"))
                .json(&payload),
        )
        .await
    }

    async fn submit_attempt(&self, attempt_id: Uuid) -> Result<(), ApiError> {
        self.send(self.request(Method::POST, &format!("/student/attempts/{attempt_id}/submit")))
            .await
    }

    async fn fetch_results(&self, attempt_id: Uuid) -> Result<AttemptResults, ApiError> {
        self.fetch_json(
            self.request(Method::GET, &format!("/student/attempts/{attempt_id}/results")),
        )
        .await
    }

    async fn list_unfinished_attempts(&self) -> Result<Vec<UnfinishedAttempt>, ApiError> {
        self.fetch_json(self.request(Method::GET, "/student/unfinished-attempts/")).await
    }

    async fn list_completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError> {
        self.fetch_json(self.request(Method::GET, "/student/completed-exams/")).await
    }

    async fn fetch_evaluated_results(
        &self,
        attempt_id: Uuid,
    ) -> Result<EvaluatedResults, ApiError> {
        self.fetch_json(
            self.request(Method::GET, &format!("/student/attempts/{attempt_id}/evaluated-results")),
        )
        .await
    }
}
