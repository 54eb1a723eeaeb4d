use std::collections::HashMap;

use crate::schemas::answer::AnswerValue;
use crate::schemas::question::{Question, QuestionKind};
use crate::schemas::result::AnswerRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub is_correct: bool,
    pub points_earned: f64,
}

impl Evaluation {
    fn incorrect() -> Self {
        Self { is_correct: false, points_earned: 0.0 }
    }
}

/// Scores one answer. All-or-nothing: there is no partial credit.
///
/// Malformed question data (missing key, out-of-range index, unknown type)
/// scores as incorrect.
pub fn evaluate(question: &Question, submitted: Option<&AnswerValue>) -> Evaluation {
    let Some(submitted) = submitted.filter(|value| !value.is_blank()) else {
        return Evaluation::incorrect();
    };

    let is_correct = match &question.kind {
        QuestionKind::MultipleChoice { choices, correct_answer } => {
            match (submitted.as_choice_index(), correct_answer) {
                (Some(chosen), Some(correct)) => *correct < choices.len() && chosen == *correct,
                _ => false,
            }
        }
        QuestionKind::TrueFalse { correct_answer } => match (submitted.as_bool(), correct_answer) {
            (Some(chosen), Some(correct)) => chosen == *correct,
            _ => false,
        },
        QuestionKind::FillInBlank { acceptable_answers, case_sensitive } => {
            let given = normalize_text(&submitted.as_text(), *case_sensitive);
            !given.is_empty()
                && acceptable_answers
                    .iter()
                    .any(|accepted| normalize_text(accepted, *case_sensitive) == given)
        }
        QuestionKind::Unknown => false,
    };

    if is_correct {
        Evaluation { is_correct: true, points_earned: question.points }
    } else {
        Evaluation::incorrect()
    }
}

fn normalize_text(raw: &str, case_sensitive: bool) -> String {
    let trimmed = raw.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttempt {
    pub answers: Vec<AnswerRecord>,
    pub score: f64,
    pub total_points: f64,
}

/// Scores every question in order; unanswered questions still get a record.
pub fn score_attempt(questions: &[Question], answers: &HashMap<String, AnswerValue>) -> ScoredAttempt {
    let mut records = Vec::with_capacity(questions.len());
    let mut score = 0.0;
    let mut total_points = 0.0;

    for question in questions {
        let answer = answers.get(&question.id);
        let evaluation = evaluate(question, answer);
        score += evaluation.points_earned;
        total_points += question.points;
        records.push(AnswerRecord {
            question_id: question.id.clone(),
            answer: answer.cloned(),
            is_correct: evaluation.is_correct,
            points_earned: evaluation.points_earned,
        });
    }

    ScoredAttempt { answers: records, score, total_points }
}
