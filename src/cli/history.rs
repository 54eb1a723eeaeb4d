use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::render;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::schemas::quiz::Quiz;
use crate::schemas::result::QuizResult;
use crate::services::reveal_policy::{build_review, can_reveal_answers, AttemptHistory};

pub(super) async fn run(state: &AppState, quiz_id: &str) -> Result<()> {
    let context = state.session_context()?;
    let api = state.api();

    let quiz = api.fetch_quiz(quiz_id).await.with_context(|| format!("Could not load quiz {quiz_id}"))?;
    let questions = api
        .fetch_questions(quiz_id)
        .await
        .with_context(|| format!("Could not load questions for quiz {quiz_id}"))?;

    println!("{}", quiz.title);

    if context.user.role.is_faculty() {
        let results = api
            .fetch_all_results(quiz_id)
            .await
            .with_context(|| format!("Could not load results for quiz {quiz_id}"))?;
        print!("{}", roster_summary(&quiz, &results));
        return Ok(());
    }

    let results = api
        .fetch_results(quiz_id, &context.user.id)
        .await
        .with_context(|| format!("Could not load your attempts for quiz {quiz_id}"))?;
    let history = AttemptHistory::from_results(&quiz, &results);
    print!("{}", render::format_history(&history));

    let Some(latest) = results.iter().max_by_key(|result| (result.submitted_at, result.attempt_number)) else {
        return Ok(());
    };
    let reveal = can_reveal_answers(&quiz, history.attempts_used(), now_utc());
    if !reveal {
        println!("Correct answers are hidden until the quiz closes or you use all attempts.");
    }
    print!("{}", render::format_review(&build_review(&questions, &latest.answers, reveal)));
    Ok(())
}

/// One line per student: attempts used and best score.
fn roster_summary(quiz: &Quiz, results: &[QuizResult]) -> String {
    let mut by_student: BTreeMap<&str, Vec<QuizResult>> = BTreeMap::new();
    for result in results {
        by_student.entry(result.student_id.as_str()).or_default().push(result.clone());
    }
    if by_student.is_empty() {
        return "No attempts yet.\n".to_string();
    }

    let mut out = String::new();
    for (student_id, attempts) in by_student {
        let history = AttemptHistory::from_results(quiz, &attempts);
        let Some(kept) = history.kept() else {
            continue;
        };
        out.push_str(&format!(
            "{student_id}  attempts {}/{}  kept {} / {} ({}%)\n",
            history.attempts_used(),
            history.attempt_limit,
            kept.score,
            kept.total_points,
            kept.percentage
        ));
    }
    out
}
