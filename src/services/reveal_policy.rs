use time::OffsetDateTime;

use crate::core::time::format_minutes_used;
use crate::schemas::answer::AnswerValue;
use crate::schemas::question::{Question, QuestionKind};
use crate::schemas::quiz::Quiz;
use crate::schemas::result::{score_percentage, AnswerRecord, QuizResult};

/// Correct answers become visible once attempts are exhausted or the quiz has
/// closed. A quiz configured to hide them never reveals them.
pub fn can_reveal_answers(quiz: &Quiz, attempts_used: u32, now: OffsetDateTime) -> bool {
    if !quiz.show_correct_answers {
        return false;
    }
    if attempts_used >= quiz.attempt_limit() {
        return true;
    }
    quiz.closes_at().is_some_and(|closes_at| now > closes_at)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorrectAnswer {
    Choice { index: usize, text: String },
    Boolean(bool),
    Text(Vec<String>),
}

/// One question of a submitted attempt as shown on the review screen.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReview {
    pub question_id: String,
    pub title: String,
    pub prompt: String,
    pub points_possible: f64,
    pub given: Option<AnswerValue>,
    pub is_correct: bool,
    pub points_earned: f64,
    /// `None` while the reveal gate is closed.
    pub correct_answer: Option<CorrectAnswer>,
}

/// Correctness is always reported; the correct answer only when `reveal` holds.
pub fn build_review(questions: &[Question], answers: &[AnswerRecord], reveal: bool) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|question| {
            let record = answers.iter().find(|record| record.question_id == question.id);
            QuestionReview {
                question_id: question.id.clone(),
                title: question.title.clone(),
                prompt: question.prompt.clone(),
                points_possible: question.points,
                given: record.and_then(|record| record.answer.clone()),
                is_correct: record.is_some_and(|record| record.is_correct),
                points_earned: record.map(|record| record.points_earned).unwrap_or(0.0),
                correct_answer: if reveal { correct_answer_of(question) } else { None },
            }
        })
        .collect()
}

fn correct_answer_of(question: &Question) -> Option<CorrectAnswer> {
    match &question.kind {
        QuestionKind::MultipleChoice { choices, correct_answer } => {
            let index = (*correct_answer)?;
            let text = choices.get(index)?.clone();
            Some(CorrectAnswer::Choice { index, text })
        }
        QuestionKind::TrueFalse { correct_answer } => correct_answer.map(CorrectAnswer::Boolean),
        QuestionKind::FillInBlank { acceptable_answers, .. } => {
            let answers: Vec<String> = acceptable_answers
                .iter()
                .filter(|answer| !answer.trim().is_empty())
                .cloned()
                .collect();
            (!answers.is_empty()).then_some(CorrectAnswer::Text(answers))
        }
        QuestionKind::Unknown => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRow {
    pub number: u32,
    pub score: f64,
    pub total_points: f64,
    pub percentage: u32,
    pub time_used: String,
    pub submitted_at: Option<OffsetDateTime>,
}

/// Summary of a student's prior attempts on one quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptHistory {
    pub rows: Vec<AttemptRow>,
    pub attempt_limit: u32,
    pub can_retake: bool,
}

impl AttemptHistory {
    pub fn from_results(quiz: &Quiz, results: &[QuizResult]) -> Self {
        let mut ordered: Vec<&QuizResult> = results.iter().collect();
        // Undated records sort first, then by their stored attempt number.
        ordered.sort_by_key(|result| (result.submitted_at, result.attempt_number));

        let rows: Vec<AttemptRow> = ordered
            .iter()
            .enumerate()
            .map(|(index, result)| AttemptRow {
                number: result.attempt_number.unwrap_or(index as u32 + 1),
                score: result.score,
                total_points: result.total_points,
                percentage: score_percentage(result.score, result.total_points),
                time_used: format_minutes_used(result.time_spent),
                submitted_at: result.submitted_at,
            })
            .collect();

        let attempt_limit = quiz.attempt_limit();
        let can_retake = quiz.multiple_attempts && (rows.len() as u32) < attempt_limit;
        Self { rows, attempt_limit, can_retake }
    }

    pub fn attempts_used(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn latest(&self) -> Option<&AttemptRow> {
        self.rows.last()
    }

    /// The score that counts: the best attempt.
    pub fn kept(&self) -> Option<&AttemptRow> {
        self.rows.iter().max_by(|left, right| left.score.total_cmp(&right.score))
    }
}
