use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::api::errors::{extract_error_message, ApiError};
use crate::api::paths;
use crate::core::config::Settings;
use crate::schemas::question::{Question, QuestionDraft};
use crate::schemas::quiz::Quiz;
use crate::schemas::result::{NewQuizResult, QuizResult};

/// Remote quiz API consumed by the attempt workflow and the question editor.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError>;

    async fn fetch_questions(&self, quiz_id: &str) -> Result<Vec<Question>, ApiError>;

    async fn create_question(
        &self,
        quiz_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError>;

    async fn update_question(
        &self,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError>;

    async fn delete_question(&self, question_id: &str) -> Result<(), ApiError>;

    async fn submit_result(
        &self,
        quiz_id: &str,
        result: &NewQuizResult,
    ) -> Result<QuizResult, ApiError>;

    async fn fetch_results(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> Result<Vec<QuizResult>, ApiError>;

    async fn fetch_all_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, ApiError>;

    async fn list_course_quizzes(&self, course_id: &str) -> Result<Vec<Quiz>, ApiError>;

    async fn update_quiz(&self, quiz: &Quiz) -> Result<Quiz, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpQuizApi {
    client: Client,
    base_url: String,
}

impl HttpQuizApi {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api = settings.api();
        Ok(Self::new(
            api.base_url.as_str(),
            Duration::from_secs(api.timeout_seconds),
            Duration::from_secs(api.connect_timeout_seconds),
            api.session_cookie.as_deref(),
        )?)
    }

    /// Builds a client with a cookie store so the server's session cookie sticks.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
        session_cookie: Option<&str>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| {
                ApiError::InvalidRequest("session cookie contains invalid characters".to_string())
            })?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport { path: base_url.to_string(), source })?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let raw_body = self.send_raw(method, path, body).await?;
        serde_json::from_str::<T>(&raw_body)
            .map_err(|source| ApiError::Decode { path: path.to_string(), source })
    }

    async fn send_raw<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { path: path.to_string(), source })?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { path: path.to_string(), source })?;

        if !status.is_success() {
            tracing::warn!(%method, path, status = status.as_u16(), "Quiz API request failed");
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                detail: extract_error_message(&raw_body),
            });
        }

        tracing::debug!(%method, path, status = status.as_u16(), "Quiz API request completed");
        Ok(raw_body)
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        self.send::<(), _>(Method::GET, &paths::quiz(quiz_id), None).await
    }

    async fn fetch_questions(&self, quiz_id: &str) -> Result<Vec<Question>, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        let questions: Option<Vec<Question>> =
            self.send::<(), _>(Method::GET, &paths::quiz_questions(quiz_id), None).await?;
        Ok(questions.unwrap_or_default())
    }

    async fn create_question(
        &self,
        quiz_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        ensure_valid(draft)?;
        self.send(Method::POST, &paths::quiz_questions(quiz_id), Some(draft)).await
    }

    async fn update_question(
        &self,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError> {
        ensure_id("question id", question_id)?;
        ensure_valid(draft)?;
        self.send(Method::PUT, &paths::question(question_id), Some(draft)).await
    }

    async fn delete_question(&self, question_id: &str) -> Result<(), ApiError> {
        ensure_id("question id", question_id)?;
        // The server answers with 204 or a small ack body; neither is needed.
        self.send_raw::<()>(Method::DELETE, &paths::question(question_id), None).await?;
        Ok(())
    }

    async fn submit_result(
        &self,
        quiz_id: &str,
        result: &NewQuizResult,
    ) -> Result<QuizResult, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        self.send(Method::POST, &paths::quiz_results(quiz_id), Some(result)).await
    }

    async fn fetch_results(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> Result<Vec<QuizResult>, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        ensure_id("student id", student_id)?;
        let results: Option<Vec<QuizResult>> = self
            .send::<(), _>(Method::GET, &paths::student_results(quiz_id, student_id), None)
            .await?;
        Ok(results.unwrap_or_default())
    }

    async fn fetch_all_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, ApiError> {
        ensure_id("quiz id", quiz_id)?;
        let results: Option<Vec<QuizResult>> =
            self.send::<(), _>(Method::GET, &paths::quiz_results(quiz_id), None).await?;
        Ok(results.unwrap_or_default())
    }

    async fn list_course_quizzes(&self, course_id: &str) -> Result<Vec<Quiz>, ApiError> {
        ensure_id("course id", course_id)?;
        let quizzes: Option<Vec<Quiz>> =
            self.send::<(), _>(Method::GET, &paths::course_quizzes(course_id), None).await?;
        Ok(quizzes.unwrap_or_default())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<Quiz, ApiError> {
        ensure_id("quiz id", &quiz.id)?;
        self.send(Method::PUT, &paths::quiz(&quiz.id), Some(quiz)).await
    }
}

fn ensure_id(kind: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() || value.contains('/') {
        return Err(ApiError::InvalidRequest(format!("{kind} '{value}' is not a valid identifier")));
    }
    Ok(())
}

fn ensure_valid(draft: &QuestionDraft) -> Result<(), ApiError> {
    draft.validate().map_err(|err| ApiError::InvalidRequest(err.to_string()))
}

/// Status codes the UI treats as "try again" rather than "gone".
pub fn is_retryable(err: &ApiError) -> bool {
    match err {
        ApiError::Transport { .. } => true,
        ApiError::Status { status, .. } => {
            status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
        }
        ApiError::Decode { .. } | ApiError::InvalidRequest(_) => false,
    }
}
