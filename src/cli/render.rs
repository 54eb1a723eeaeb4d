use std::collections::HashSet;
use std::fmt::Write as _;

use ammonia::Builder;

use crate::core::time::{format_clock, format_due};
use crate::schemas::answer::AnswerValue;
use crate::schemas::question::{Question, QuestionKind};
use crate::schemas::quiz::Quiz;
use crate::services::attempt_session::{DisplayChoice, SaveStatus, SubmitReport};
use crate::services::reveal_policy::{AttemptHistory, CorrectAnswer, QuestionReview};

/// Prompts are editor HTML; the terminal gets the text only.
///
/// No tag survives the whitelist and script or style bodies are dropped with
/// their tags. The cleaned text is still HTML-escaped, so it is decoded once.
pub(super) fn strip_tags(html: &str) -> String {
    // Tags separate words: `<p>a</p><p>b</p>` reads "a b".
    let spaced = html.replace('<', " <");
    let cleaned = Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(&spaced)
        .to_string();
    decode_entities(&cleaned).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Undoes the escaping ammonia applies to text nodes; `&amp;` goes last so
/// escaped entity text stays literal.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub(super) fn quiz_header(quiz: &Quiz, question_count: usize, attempts_used: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", quiz.title);
    if let Some(due) = quiz.due_date {
        let _ = writeln!(out, "Due {}", format_due(due));
    }
    let points: f64 = quiz.points.unwrap_or_default();
    let _ = writeln!(out, "Points {points}  Questions {question_count}");
    match quiz.time_limit_seconds() {
        Some(seconds) => {
            let _ = writeln!(out, "Time limit {} minutes", seconds / 60);
        }
        None => {
            let _ = writeln!(out, "No time limit");
        }
    }
    let _ = writeln!(out, "Attempts {attempts_used} of {}", quiz.attempt_limit());
    out
}

pub(super) fn format_question(
    position: usize,
    total: usize,
    question: &Question,
    choices: Option<&[DisplayChoice]>,
    current: Option<&AnswerValue>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Question {} of {}  ({} pts)  {}  [{}]",
        position + 1,
        total,
        question.points,
        question.title,
        question.kind.label()
    );
    let _ = writeln!(out, "{}", strip_tags(&question.prompt));

    match &question.kind {
        QuestionKind::MultipleChoice { .. } => {
            for (slot, choice) in choices.unwrap_or_default().iter().enumerate() {
                let marker = match current.and_then(AnswerValue::as_choice_index) {
                    Some(index) if index == choice.index => "*",
                    _ => " ",
                };
                let _ = writeln!(out, " {marker} {}) {}", slot + 1, choice.text);
            }
        }
        QuestionKind::TrueFalse { .. } => {
            let _ = writeln!(out, "   true / false");
        }
        QuestionKind::FillInBlank { .. } => {
            let _ = writeln!(out, "   type your answer");
        }
        QuestionKind::Unknown => {
            let _ = writeln!(out, "   (unsupported question type)");
        }
    }

    if let Some(value) = current.filter(|value| !value.is_blank()) {
        if !matches!(question.kind, QuestionKind::MultipleChoice { .. }) {
            let _ = writeln!(out, "   current answer: {}", value.as_text());
        }
    }
    out
}

/// Turns a typed line into an answer for `question`.
///
/// Multiple-choice input is the 1-based slot on screen, mapped back to the
/// canonical choice index so shuffling never leaks into stored answers.
pub(super) fn parse_answer(
    question: &Question,
    choices: Option<&[DisplayChoice]>,
    input: &str,
) -> Result<AnswerValue, String> {
    let input = input.trim();
    match &question.kind {
        QuestionKind::MultipleChoice { .. } => {
            let choices = choices.unwrap_or_default();
            let slot: usize =
                input.parse().map_err(|_| format!("enter a choice number between 1 and {}", choices.len()))?;
            slot.checked_sub(1)
                .and_then(|slot| choices.get(slot))
                .map(|choice| AnswerValue::from(choice.index))
                .ok_or_else(|| format!("enter a choice number between 1 and {}", choices.len()))
        }
        QuestionKind::TrueFalse { .. } => match input.to_ascii_lowercase().as_str() {
            "t" | "true" => Ok(AnswerValue::Bool(true)),
            "f" | "false" => Ok(AnswerValue::Bool(false)),
            _ => Err("enter true or false".to_string()),
        },
        QuestionKind::FillInBlank { .. } | QuestionKind::Unknown => Ok(AnswerValue::from(input)),
    }
}

pub(super) fn time_line(remaining_seconds: u64, low_time: bool) -> String {
    if low_time {
        format!("Time remaining {} (almost out of time)", format_clock(remaining_seconds))
    } else {
        format!("Time remaining {}", format_clock(remaining_seconds))
    }
}

pub(super) fn format_report(report: &SubmitReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Score {} / {} ({}%)",
        report.score,
        report.total_points,
        report.percentage()
    );
    let status = match &report.save {
        SaveStatus::Saved(_) => "Your attempt was saved.".to_string(),
        SaveStatus::Failed(err) => err.to_string(),
        SaveStatus::Preview => "Preview only: nothing was recorded.".to_string(),
        SaveStatus::Discarded => "The attempt was closed before the server answered.".to_string(),
        SaveStatus::Pending => "Saving...".to_string(),
    };
    let _ = writeln!(out, "{status}");
    out
}

pub(super) fn format_review(reviews: &[QuestionReview]) -> String {
    let mut out = String::new();
    for (position, review) in reviews.iter().enumerate() {
        let verdict = if review.is_correct { "correct" } else { "incorrect" };
        let _ = writeln!(
            out,
            "{}. {}  {} ({} / {} pts)",
            position + 1,
            review.title,
            verdict,
            review.points_earned,
            review.points_possible
        );
        let given = review.given.as_ref().map(|value| value.as_text().into_owned());
        let _ = writeln!(out, "   your answer: {}", given.as_deref().unwrap_or("(no answer)"));
        if let Some(correct) = &review.correct_answer {
            let text = match correct {
                CorrectAnswer::Choice { text, .. } => text.clone(),
                CorrectAnswer::Boolean(value) => value.to_string(),
                CorrectAnswer::Text(answers) => answers.join(" / "),
            };
            let _ = writeln!(out, "   correct answer: {text}");
        }
    }
    out
}

pub(super) fn format_history(history: &AttemptHistory) -> String {
    let mut out = String::new();
    if history.rows.is_empty() {
        let _ = writeln!(out, "No attempts yet.");
        return out;
    }
    for row in &history.rows {
        let _ = writeln!(
            out,
            "Attempt {}  {} / {}  ({}%)  {}",
            row.number, row.score, row.total_points, row.percentage, row.time_used
        );
    }
    if let Some(latest) = history.latest() {
        let _ = writeln!(out, "Latest score {} / {}", latest.score, latest.total_points);
    }
    if let Some(kept) = history.kept() {
        let _ = writeln!(out, "Kept score {} / {}", kept.score, kept.total_points);
    }
    if history.can_retake {
        let _ = writeln!(
            out,
            "You may retake this quiz ({} of {} attempts used).",
            history.rows.len(),
            history.attempt_limit
        );
    }
    out
}
