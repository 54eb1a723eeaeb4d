use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use time::{Duration as TimeDuration, OffsetDateTime};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api::client::{HttpQuizApi, QuizApi};
use crate::api::errors::ApiError;
use crate::core::time::now_utc;
use crate::schemas::question::{Question, QuestionDraft, QuestionKind};
use crate::schemas::quiz::{Quiz, QuizType};
use crate::schemas::result::{NewQuizResult, QuizResult};

pub(crate) const TEST_STUDENT_ID: &str = "S1";
pub(crate) const TEST_COURSE_ID: &str = "RS101";

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn clear_kambaz_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("KAMBAZ_") {
            std::env::remove_var(key);
        }
    }
    std::env::remove_var("ENVIRONMENT");
}

pub(crate) fn sample_quiz(id: &str) -> Quiz {
    Quiz {
        id: id.to_string(),
        title: "Q1 - HTML".to_string(),
        course: TEST_COURSE_ID.to_string(),
        published: true,
        description: None,
        points: Some(5.0),
        quiz_type: QuizType::GradedQuiz,
        shuffle_answers: false,
        time_limit: true,
        time_limit_minutes: Some(1),
        multiple_attempts: false,
        how_many_attempts: None,
        available_from_date: Some(now_utc() - TimeDuration::days(1)),
        available_until_date: None,
        due_date: Some(now_utc() + TimeDuration::days(7)),
        show_correct_answers: true,
    }
}

pub(crate) fn multiple_choice(id: &str, choices: &[&str], correct: usize, points: f64) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        prompt: format!("<p>Prompt for {id}</p>"),
        points,
        kind: QuestionKind::MultipleChoice {
            choices: choices.iter().map(|choice| choice.to_string()).collect(),
            correct_answer: Some(correct),
        },
    }
}

pub(crate) fn true_false(id: &str, correct: bool, points: f64) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        prompt: format!("<p>Prompt for {id}</p>"),
        points,
        kind: QuestionKind::TrueFalse { correct_answer: Some(correct) },
    }
}

pub(crate) fn fill_in_blank(id: &str, answers: &[&str], case_sensitive: bool, points: f64) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        prompt: format!("<p>Prompt for {id}</p>"),
        points,
        kind: QuestionKind::FillInBlank {
            acceptable_answers: answers.iter().map(|answer| answer.to_string()).collect(),
            case_sensitive,
        },
    }
}

pub(crate) fn prior_result(quiz_id: &str, student_id: &str, score: f64, total: f64) -> QuizResult {
    QuizResult {
        id: None,
        quiz: Some(quiz_id.to_string()),
        student_id: student_id.to_string(),
        course_id: Some(TEST_COURSE_ID.to_string()),
        answers: Vec::new(),
        score,
        total_points: total,
        time_spent: 90,
        attempt_number: None,
        started_at: None,
        submitted_at: Some(now_utc() - TimeDuration::hours(1)),
    }
}

pub(crate) fn stored_result(quiz_id: &str, payload: &NewQuizResult, attempt_number: u32) -> QuizResult {
    QuizResult {
        id: Some(format!("R{attempt_number}")),
        quiz: Some(quiz_id.to_string()),
        student_id: payload.student_id.clone(),
        course_id: Some(payload.course_id.clone()),
        answers: payload.answers.clone(),
        score: payload.score,
        total_points: payload.total_points,
        time_spent: payload.time_spent,
        attempt_number: Some(attempt_number),
        started_at: Some(payload.started_at),
        submitted_at: Some(payload.submitted_at),
    }
}

/// In-memory [`QuizApi`] that records every result POST.
#[derive(Default)]
pub(crate) struct FakeQuizApi {
    pub(crate) quiz: StdMutex<Option<Quiz>>,
    pub(crate) questions: StdMutex<Vec<Question>>,
    pub(crate) results: StdMutex<Vec<QuizResult>>,
    pub(crate) posted: StdMutex<Vec<NewQuizResult>>,
    pub(crate) post_count: AtomicUsize,
    pub(crate) results_fetches: AtomicUsize,
    pub(crate) fail_submit: bool,
    pub(crate) fail_results_fetch: bool,
    pub(crate) submit_delay: Option<Duration>,
    pub(crate) load_delay: Option<Duration>,
}

impl FakeQuizApi {
    pub(crate) fn with_quiz(quiz: Quiz, questions: Vec<Question>) -> Self {
        Self { quiz: StdMutex::new(Some(quiz)), questions: StdMutex::new(questions), ..Self::default() }
    }

    pub(crate) fn with_results(self, results: Vec<QuizResult>) -> Self {
        *self.results.lock().expect("results lock") = results;
        self
    }

    pub(crate) fn posts(&self) -> usize {
        self.post_count.load(Ordering::SeqCst)
    }

    pub(crate) fn last_post(&self) -> Option<NewQuizResult> {
        self.posted.lock().expect("posted lock").last().cloned()
    }

    fn server_error(path: String) -> ApiError {
        ApiError::Status {
            path,
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Database unavailable".to_string(),
        }
    }

    fn not_found(path: String) -> ApiError {
        ApiError::Status {
            path,
            status: reqwest::StatusCode::NOT_FOUND,
            detail: "Quiz not found".to_string(),
        }
    }
}

#[async_trait]
impl QuizApi for FakeQuizApi {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError> {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        let quiz = self.quiz.lock().expect("quiz lock").clone();
        match quiz {
            Some(quiz) if quiz.id == quiz_id => Ok(quiz),
            _ => Err(Self::not_found(format!("/api/quizzes/{quiz_id}"))),
        }
    }

    async fn fetch_questions(&self, _quiz_id: &str) -> Result<Vec<Question>, ApiError> {
        Ok(self.questions.lock().expect("questions lock").clone())
    }

    async fn create_question(&self, quiz_id: &str, draft: &QuestionDraft) -> Result<Question, ApiError> {
        let mut questions = self.questions.lock().expect("questions lock");
        let question = Question {
            id: format!("{quiz_id}-q{}", questions.len() + 1),
            title: draft.title.clone(),
            prompt: draft.prompt.clone(),
            points: draft.points,
            kind: draft.kind.clone(),
        };
        questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(&self, question_id: &str, draft: &QuestionDraft) -> Result<Question, ApiError> {
        let mut questions = self.questions.lock().expect("questions lock");
        let Some(existing) = questions.iter_mut().find(|question| question.id == question_id) else {
            return Err(Self::not_found(format!("/api/questions/{question_id}")));
        };
        existing.title = draft.title.clone();
        existing.prompt = draft.prompt.clone();
        existing.points = draft.points;
        existing.kind = draft.kind.clone();
        Ok(existing.clone())
    }

    async fn delete_question(&self, question_id: &str) -> Result<(), ApiError> {
        self.questions.lock().expect("questions lock").retain(|question| question.id != question_id);
        Ok(())
    }

    async fn submit_result(&self, quiz_id: &str, result: &NewQuizResult) -> Result<QuizResult, ApiError> {
        let attempt = self.post_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        self.posted.lock().expect("posted lock").push(result.clone());
        if self.fail_submit {
            return Err(Self::server_error(format!("/api/quizzes/{quiz_id}/results")));
        }
        let stored = stored_result(quiz_id, result, attempt as u32);
        self.results.lock().expect("results lock").push(stored.clone());
        Ok(stored)
    }

    async fn fetch_results(&self, quiz_id: &str, student_id: &str) -> Result<Vec<QuizResult>, ApiError> {
        self.results_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_results_fetch {
            return Err(Self::server_error(format!("/api/quizzes/{quiz_id}/results/{student_id}")));
        }
        Ok(self
            .results
            .lock()
            .expect("results lock")
            .iter()
            .filter(|result| result.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn fetch_all_results(&self, _quiz_id: &str) -> Result<Vec<QuizResult>, ApiError> {
        Ok(self.results.lock().expect("results lock").clone())
    }

    async fn list_course_quizzes(&self, course_id: &str) -> Result<Vec<Quiz>, ApiError> {
        let quiz = self.quiz.lock().expect("quiz lock").clone();
        Ok(quiz.into_iter().filter(|quiz| quiz.course == course_id).collect())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<Quiz, ApiError> {
        *self.quiz.lock().expect("quiz lock") = Some(quiz.clone());
        Ok(quiz.clone())
    }
}

/// State behind the in-process fake of the quiz server.
#[derive(Default)]
pub(crate) struct FakeServerState {
    pub(crate) quizzes: StdMutex<HashMap<String, Value>>,
    pub(crate) questions: StdMutex<HashMap<String, Vec<Value>>>,
    pub(crate) results: StdMutex<Vec<Value>>,
    pub(crate) result_posts: AtomicUsize,
    pub(crate) fail_result_posts: StdMutex<bool>,
    pub(crate) last_cookie: StdMutex<Option<String>>,
}

impl FakeServerState {
    pub(crate) fn insert_quiz(&self, quiz: Value) {
        let id = quiz["_id"].as_str().unwrap_or_default().to_string();
        self.quizzes.lock().expect("quizzes lock").insert(id, quiz);
    }

    pub(crate) fn insert_questions(&self, quiz_id: &str, questions: Vec<Value>) {
        self.questions.lock().expect("questions lock").insert(quiz_id.to_string(), questions);
    }

    pub(crate) fn fail_result_posts(&self, fail: bool) {
        *self.fail_result_posts.lock().expect("fail flag lock") = fail;
    }

    pub(crate) fn result_posts(&self) -> usize {
        self.result_posts.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeServer {
    pub(crate) addr: SocketAddr,
    pub(crate) state: Arc<FakeServerState>,
}

impl FakeServer {
    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn client(&self) -> HttpQuizApi {
        self.client_with_cookie(None)
    }

    pub(crate) fn client_with_cookie(&self, cookie: Option<&str>) -> HttpQuizApi {
        HttpQuizApi::new(&self.base_url(), Duration::from_secs(5), Duration::from_secs(2), cookie)
            .expect("http client")
    }
}

pub(crate) async fn spawn_fake_server() -> FakeServer {
    let state = Arc::new(FakeServerState::default());
    let app = Router::new()
        .route("/api/quizzes/:quiz_id", get(get_quiz).put(put_quiz))
        .route("/api/quizzes/:quiz_id/questions", get(list_questions).post(create_question))
        .route("/api/questions/:question_id", put(update_question).delete(delete_question))
        .route("/api/quizzes/:quiz_id/results", get(list_results).post(create_result))
        .route("/api/quizzes/:quiz_id/results/:student_id", get(student_results))
        .route("/api/courses/:course_id/quizzes", get(course_quizzes))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
    let addr = listener.local_addr().expect("fake server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server");
    });

    FakeServer { addr, state }
}

type Shared = State<Arc<FakeServerState>>;

fn remember_cookie(state: &FakeServerState, headers: &HeaderMap) {
    let cookie = headers.get(header::COOKIE).and_then(|value| value.to_str().ok()).map(str::to_string);
    *state.last_cookie.lock().expect("cookie lock") = cookie;
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

async fn get_quiz(State(state): Shared, headers: HeaderMap, Path(quiz_id): Path<String>) -> Response {
    remember_cookie(&state, &headers);
    match state.quizzes.lock().expect("quizzes lock").get(&quiz_id) {
        Some(quiz) => Json(quiz.clone()).into_response(),
        None => not_found("Quiz not found"),
    }
}

async fn put_quiz(State(state): Shared, Path(quiz_id): Path<String>, Json(mut body): Json<Value>) -> Response {
    body["_id"] = Value::String(quiz_id.clone());
    state.quizzes.lock().expect("quizzes lock").insert(quiz_id, body.clone());
    Json(body).into_response()
}

async fn list_questions(State(state): Shared, Path(quiz_id): Path<String>) -> Response {
    let questions = state.questions.lock().expect("questions lock").get(&quiz_id).cloned().unwrap_or_default();
    Json(questions).into_response()
}

async fn create_question(
    State(state): Shared,
    Path(quiz_id): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    let mut questions = state.questions.lock().expect("questions lock");
    let entry = questions.entry(quiz_id.clone()).or_default();
    body["_id"] = Value::String(format!("{quiz_id}-q{}", entry.len() + 1));
    body["quiz"] = Value::String(quiz_id);
    entry.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn update_question(
    State(state): Shared,
    Path(question_id): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    let mut questions = state.questions.lock().expect("questions lock");
    for question in questions.values_mut().flatten() {
        if question["_id"] == question_id.as_str() {
            body["_id"] = Value::String(question_id);
            *question = body.clone();
            return Json(body).into_response();
        }
    }
    not_found("Question not found")
}

async fn delete_question(State(state): Shared, Path(question_id): Path<String>) -> Response {
    let mut questions = state.questions.lock().expect("questions lock");
    for list in questions.values_mut() {
        list.retain(|question| question["_id"] != question_id.as_str());
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn create_result(State(state): Shared, Path(quiz_id): Path<String>, Json(mut body): Json<Value>) -> Response {
    let attempt = state.result_posts.fetch_add(1, Ordering::SeqCst) + 1;
    if *state.fail_result_posts.lock().expect("fail flag lock") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Database unavailable" })))
            .into_response();
    }
    body["_id"] = Value::String(format!("R{attempt}"));
    body["quiz"] = Value::String(quiz_id);
    body["attemptNumber"] = json!(attempt);
    state.results.lock().expect("results lock").push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn list_results(State(state): Shared, Path(quiz_id): Path<String>) -> Response {
    let results: Vec<Value> = state
        .results
        .lock()
        .expect("results lock")
        .iter()
        .filter(|result| result["quiz"] == quiz_id.as_str())
        .cloned()
        .collect();
    Json(results).into_response()
}

async fn student_results(State(state): Shared, Path((quiz_id, student_id)): Path<(String, String)>) -> Response {
    let results: Vec<Value> = state
        .results
        .lock()
        .expect("results lock")
        .iter()
        .filter(|result| result["quiz"] == quiz_id.as_str() && result["studentId"] == student_id.as_str())
        .cloned()
        .collect();
    Json(results).into_response()
}

async fn course_quizzes(State(state): Shared, Path(course_id): Path<String>) -> Response {
    let quizzes: Vec<Value> = state
        .quizzes
        .lock()
        .expect("quizzes lock")
        .values()
        .filter(|quiz| quiz["course"] == course_id.as_str())
        .cloned()
        .collect();
    Json(quizzes).into_response()
}

pub(crate) fn quiz_json(id: &str, available_from: OffsetDateTime) -> Value {
    json!({
        "_id": id,
        "title": "Q1 - HTML",
        "course": TEST_COURSE_ID,
        "published": true,
        "quizType": "Graded Quiz",
        "points": 5,
        "timeLimit": true,
        "timeLimitMinutes": 20,
        "multipleAttempts": false,
        "availableFromDate": crate::core::time::format_offset(available_from),
        "dueDate": crate::core::time::format_offset(now_utc() + TimeDuration::days(7)),
    })
}
