//! One student's attempt at one quiz.
//!
//! The session owns the answer map, the cursor and the timer. Submission is
//! single-flight: the first caller flips the session to submitted before any
//! network I/O, so every later or concurrent call is a no-op and exactly one
//! result is posted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::api::client::{is_retryable, QuizApi};
use crate::api::errors::ApiError;
use crate::core::time::now_utc;
use crate::schemas::answer::AnswerValue;
use crate::schemas::question::{Question, QuestionKind};
use crate::schemas::quiz::Quiz;
use crate::schemas::result::{score_percentage, AnswerRecord, NewQuizResult, QuizResult};
use crate::schemas::user::CurrentUser;
use crate::services::attempt_timer::{AttemptTimer, TickOutcome, TimerSnapshot};
use crate::services::eligibility::{check_eligibility, Ineligible};
use crate::services::evaluator::score_attempt;
use crate::services::reveal_policy::{build_review, can_reveal_answers, QuestionReview};

/// Cleared on teardown; responses that arrive afterwards are dropped.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn tear_down(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a session needs from its surroundings.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: CurrentUser,
    /// Falls back to the quiz's own course when unset.
    pub course_id: Option<String>,
    pub liveness: Liveness,
}

impl SessionContext {
    pub fn new(user: CurrentUser, course_id: Option<String>) -> Self {
        Self { user, course_id, liveness: Liveness::new() }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load quiz: {0}")]
    Quiz(#[source] ApiError),
    #[error("failed to load questions: {0}")]
    Questions(#[source] ApiError),
    #[error("failed to load previous attempts: {0}")]
    PriorResults(#[source] ApiError),
    #[error("quiz load was cancelled")]
    Cancelled,
}

impl LoadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Quiz(err) | Self::Questions(err) | Self::PriorResults(err) => is_retryable(err),
            Self::Cancelled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error(transparent)]
    Ineligible(#[from] Ineligible),
    #[error("attempt already started")]
    AlreadyStarted,
    #[error("attempt already submitted")]
    AlreadySubmitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("attempt has not started")]
    NotStarted,
    #[error("attempt already submitted")]
    AlreadySubmitted,
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(String),
    #[error("question index {index} is out of range (quiz has {count} questions)")]
    OutOfRange { index: usize, count: usize },
}

/// The result POST failed after scoring. The attempt stays submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("your answers were scored but could not be saved: {detail}")]
pub struct SaveError {
    pub detail: String,
    pub retryable: bool,
}

impl From<&ApiError> for SaveError {
    fn from(err: &ApiError) -> Self {
        let detail = match err {
            ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        };
        Self { detail, retryable: is_retryable(err) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Pending,
    Saved(QuizResult),
    Failed(SaveError),
    /// Faculty preview: nothing is sent.
    Preview,
    /// The session was torn down before the server answered.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timer,
}

impl SubmitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timer => "timer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub trigger: SubmitTrigger,
    pub answers: Vec<AnswerRecord>,
    pub score: f64,
    pub total_points: f64,
    pub time_spent: u64,
    pub save: SaveStatus,
}

impl SubmitReport {
    pub fn percentage(&self) -> u32 {
        score_percentage(self.score, self.total_points)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayChoice {
    /// Canonical index stored as the answer.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Submitted,
}

#[derive(Clone)]
pub struct AttemptSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: Arc<dyn QuizApi>,
    context: SessionContext,
    attempt_id: Uuid,
    quiz: Quiz,
    questions: Vec<Question>,
    prior_results: Vec<QuizResult>,
    state: Mutex<SessionState>,
}

struct SessionState {
    phase: Phase,
    answers: HashMap<String, AnswerValue>,
    cursor: usize,
    timer: AttemptTimer,
    started_at: Option<OffsetDateTime>,
    display_orders: HashMap<String, Vec<usize>>,
    report: Option<SubmitReport>,
}

impl AttemptSession {
    /// Fetches the quiz, its questions and, for students, their prior results.
    pub async fn load(
        api: Arc<dyn QuizApi>,
        context: SessionContext,
        quiz_id: &str,
    ) -> Result<Self, LoadError> {
        let attempt_id = Uuid::new_v4();
        let preview = context.user.role.is_faculty();

        let (quiz, questions) = tokio::join!(api.fetch_quiz(quiz_id), api.fetch_questions(quiz_id));
        let quiz = quiz.map_err(|err| load_failed(quiz_id, LoadError::Quiz(err)))?;
        let questions = questions.map_err(|err| load_failed(quiz_id, LoadError::Questions(err)))?;

        let prior_results = if preview {
            Vec::new()
        } else {
            api.fetch_results(quiz_id, &context.user.id)
                .await
                .map_err(|err| load_failed(quiz_id, LoadError::PriorResults(err)))?
        };

        if !context.liveness.is_alive() {
            tracing::debug!(quiz_id, %attempt_id, "Discarding quiz load after teardown");
            return Err(LoadError::Cancelled);
        }

        tracing::info!(
            quiz_id,
            %attempt_id,
            questions = questions.len(),
            attempts_used = prior_results.len(),
            preview,
            "Quiz loaded"
        );

        let timer = AttemptTimer::new(quiz.time_limit_seconds());
        Ok(Self {
            inner: Arc::new(SessionInner {
                api,
                context,
                attempt_id,
                quiz,
                questions,
                prior_results,
                state: Mutex::new(SessionState {
                    phase: Phase::NotStarted,
                    answers: HashMap::new(),
                    cursor: 0,
                    timer,
                    started_at: None,
                    display_orders: HashMap::new(),
                    report: None,
                }),
            }),
        })
    }

    pub fn attempt_id(&self) -> Uuid {
        self.inner.attempt_id
    }

    pub fn quiz(&self) -> &Quiz {
        &self.inner.quiz
    }

    pub fn questions(&self) -> &[Question] {
        &self.inner.questions
    }

    pub fn prior_results(&self) -> &[QuizResult] {
        &self.inner.prior_results
    }

    pub fn is_preview(&self) -> bool {
        self.inner.context.user.role.is_faculty()
    }

    /// Prior attempts, plus this one once it has been submitted for real.
    pub fn attempts_used(&self) -> u32 {
        let prior = self.inner.prior_results.len() as u32;
        let state = self.lock_state();
        let counts_current = !self.is_preview()
            && state.report.as_ref().is_some_and(|report| matches!(report.save, SaveStatus::Saved(_)));
        if counts_current {
            prior + 1
        } else {
            prior
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase
    }

    pub fn is_submitted(&self) -> bool {
        self.phase() == Phase::Submitted
    }

    /// Whether the start action should be offered, and why not.
    pub fn eligibility(&self, now: OffsetDateTime) -> Result<(), Ineligible> {
        if self.is_preview() {
            return Ok(());
        }
        check_eligibility(&self.inner.quiz, self.inner.prior_results.len() as u32, now)
    }

    pub fn start(&self) -> Result<(), StartError> {
        self.start_with_seed(rand::random::<u32>() as u64)
    }

    pub(crate) fn start_with_seed(&self, seed: u64) -> Result<(), StartError> {
        let now = now_utc();
        let mut state = self.lock_state();
        match state.phase {
            Phase::InProgress => return Err(StartError::AlreadyStarted),
            Phase::Submitted => return Err(StartError::AlreadySubmitted),
            Phase::NotStarted => {}
        }
        self.eligibility(now)?;

        if self.inner.quiz.shuffle_answers {
            let mut rng = StdRng::seed_from_u64(seed);
            for question in &self.inner.questions {
                if let QuestionKind::MultipleChoice { choices, .. } = &question.kind {
                    let mut order: Vec<usize> = (0..choices.len()).collect();
                    order.shuffle(&mut rng);
                    state.display_orders.insert(question.id.clone(), order);
                }
            }
        }

        state.phase = Phase::InProgress;
        state.started_at = Some(now);
        state.timer.start(Instant::now());

        tracing::info!(
            quiz_id = %self.inner.quiz.id,
            attempt_id = %self.inner.attempt_id,
            time_limit_seconds = ?state.timer.limit_seconds(),
            shuffled = self.inner.quiz.shuffle_answers,
            "Attempt started"
        );
        Ok(())
    }

    /// Upserts the answer for a question. Values are not validated here.
    pub fn record_answer(&self, question_id: &str, value: AnswerValue) -> Result<(), AnswerError> {
        if !self.inner.questions.iter().any(|question| question.id == question_id) {
            return Err(AnswerError::UnknownQuestion(question_id.to_string()));
        }
        let mut state = self.lock_state();
        match state.phase {
            Phase::NotStarted => Err(AnswerError::NotStarted),
            Phase::Submitted => Err(AnswerError::AlreadySubmitted),
            Phase::InProgress => {
                state.answers.insert(question_id.to_string(), value);
                Ok(())
            }
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<AnswerValue> {
        self.lock_state().answers.get(question_id).cloned()
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.lock_state().answers.get(question_id).is_some_and(|value| !value.is_blank())
    }

    pub fn answered_count(&self) -> usize {
        let state = self.lock_state();
        self.inner
            .questions
            .iter()
            .filter(|question| state.answers.get(&question.id).is_some_and(|value| !value.is_blank()))
            .count()
    }

    pub fn cursor(&self) -> usize {
        self.lock_state().cursor
    }

    pub fn current_question(&self) -> Option<&Question> {
        let cursor = self.lock_state().cursor;
        self.inner.questions.get(cursor)
    }

    /// Moves forward; returns false on the last question.
    pub fn next(&self) -> bool {
        let mut state = self.lock_state();
        if state.cursor + 1 < self.inner.questions.len() {
            state.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&self) -> bool {
        let mut state = self.lock_state();
        if state.cursor > 0 {
            state.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_to(&self, index: usize) -> Result<(), AnswerError> {
        let count = self.inner.questions.len();
        if index >= count {
            return Err(AnswerError::OutOfRange { index, count });
        }
        self.lock_state().cursor = index;
        Ok(())
    }

    /// Choices in the order they are shown for this attempt.
    pub fn display_choices(&self, question_id: &str) -> Option<Vec<DisplayChoice>> {
        let question = self.inner.questions.iter().find(|question| question.id == question_id)?;
        let QuestionKind::MultipleChoice { choices, .. } = &question.kind else {
            return None;
        };
        let state = self.lock_state();
        let order: Vec<usize> = match state.display_orders.get(question_id) {
            Some(order) => order.clone(),
            None => (0..choices.len()).collect(),
        };
        Some(
            order
                .into_iter()
                .filter_map(|index| {
                    choices.get(index).map(|text| DisplayChoice { index, text: text.clone() })
                })
                .collect(),
        )
    }

    pub fn tick(&self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    pub(crate) fn tick_at(&self, now: Instant) -> TickOutcome {
        let mut state = self.lock_state();
        let outcome = state.timer.tick(now);
        if outcome == TickOutcome::Expired {
            tracing::info!(
                quiz_id = %self.inner.quiz.id,
                attempt_id = %self.inner.attempt_id,
                "Time limit reached; attempt will be submitted"
            );
        }
        outcome
    }

    pub fn timer_snapshot(&self) -> TimerSnapshot {
        self.lock_state().timer.snapshot(Instant::now())
    }

    pub fn report(&self) -> Option<SubmitReport> {
        self.lock_state().report.clone()
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.lock_state().report.as_ref().map(|report| report.save.clone())
    }

    /// Scores and posts the attempt. Returns `None` when another call already
    /// submitted it or the attempt never started.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Option<SubmitReport> {
        let quiz_id = self.inner.quiz.id.clone();
        let attempt_id = self.inner.attempt_id;

        let (payload, mut report) = {
            let mut state = self.lock_state();
            if state.phase != Phase::InProgress {
                tracing::debug!(quiz_id, %attempt_id, trigger = trigger.as_str(), "Ignoring submit");
                return None;
            }
            if !self.inner.context.liveness.is_alive() {
                tracing::debug!(quiz_id, %attempt_id, trigger = trigger.as_str(), "Ignoring submit after teardown");
                return None;
            }
            state.phase = Phase::Submitted;
            let time_spent = state.timer.stop(Instant::now());
            let scored = score_attempt(&self.inner.questions, &state.answers);
            let submitted_at = now_utc();

            let payload = NewQuizResult {
                student_id: self.inner.context.user.id.clone(),
                course_id: self
                    .inner
                    .context
                    .course_id
                    .clone()
                    .unwrap_or_else(|| self.inner.quiz.course.clone()),
                answers: scored.answers.clone(),
                score: scored.score,
                total_points: scored.total_points,
                time_spent,
                started_at: state.started_at.unwrap_or(submitted_at),
                submitted_at,
            };
            let report = SubmitReport {
                trigger,
                answers: scored.answers,
                score: scored.score,
                total_points: scored.total_points,
                time_spent,
                save: if self.is_preview() { SaveStatus::Preview } else { SaveStatus::Pending },
            };
            state.report = Some(report.clone());
            (payload, report)
        };

        metrics::counter!("quiz_submissions_total", "trigger" => trigger.as_str()).increment(1);
        tracing::info!(
            quiz_id,
            %attempt_id,
            trigger = trigger.as_str(),
            score = report.score,
            total_points = report.total_points,
            time_spent = report.time_spent,
            "Attempt submitted"
        );

        if report.save == SaveStatus::Preview {
            return Some(report);
        }

        let outcome = self.inner.api.submit_result(&quiz_id, &payload).await;

        if !self.inner.context.liveness.is_alive() {
            tracing::debug!(quiz_id, %attempt_id, "Discarding result response after teardown");
            report.save = SaveStatus::Discarded;
            return Some(report);
        }

        report.save = match outcome {
            Ok(stored) => SaveStatus::Saved(stored),
            Err(err) => {
                metrics::counter!("quiz_result_save_failures_total").increment(1);
                tracing::error!(quiz_id, %attempt_id, error = %err, "Failed to save quiz result");
                SaveStatus::Failed(SaveError::from(&err))
            }
        };
        self.lock_state().report = Some(report.clone());
        Some(report)
    }

    /// Review of the submitted attempt; correct answers only when the gate is open.
    pub fn review(&self, now: OffsetDateTime) -> Option<Vec<QuestionReview>> {
        let report = self.report()?;
        let reveal = self.is_preview() || can_reveal_answers(&self.inner.quiz, self.attempts_used(), now);
        Some(build_review(&self.inner.questions, &report.answers, reveal))
    }

    /// Stops the clock and drops any response still in flight.
    pub fn teardown(&self) {
        self.inner.context.liveness.tear_down();
        let mut state = self.lock_state();
        state.timer.stop(Instant::now());
        tracing::debug!(
            quiz_id = %self.inner.quiz.id,
            attempt_id = %self.inner.attempt_id,
            submitted = state.phase == Phase::Submitted,
            "Attempt session torn down"
        );
    }

    pub fn is_alive(&self) -> bool {
        self.inner.context.liveness.is_alive()
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_failed(quiz_id: &str, err: LoadError) -> LoadError {
    metrics::counter!("quiz_load_failures_total").increment(1);
    tracing::warn!(quiz_id, error = %err, "Failed to load quiz");
    err
}
