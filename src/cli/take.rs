use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Instrument;

use super::render;
use crate::core::shutdown::shutdown_watch;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::services::attempt_session::{AttemptSession, SubmitReport, SubmitTrigger};
use crate::tasks::attempt_clock;

const HELP: &str = "Type an answer, or :next  :prev  :go <n>  :time  :submit  :quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    GoTo(usize),
    Time,
    Submit,
    Quit,
    Help,
    Answer(String),
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Ok(Input::Answer(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "next" | "n" => Ok(Input::Next),
        "prev" | "p" => Ok(Input::Previous),
        "go" | "g" => parts
            .next()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| Input::GoTo(value - 1))
            .ok_or_else(|| "usage: :go <question number>".to_string()),
        "time" | "t" => Ok(Input::Time),
        "submit" | "s" => Ok(Input::Submit),
        "quit" | "q" => Ok(Input::Quit),
        "help" | "h" => Ok(Input::Help),
        other => Err(format!("unknown command :{other}")),
    }
}

pub(super) async fn run(state: &AppState, quiz_id: &str) -> Result<()> {
    let context = state.session_context()?;
    let session = AttemptSession::load(state.api(), context, quiz_id)
        .await
        .with_context(|| format!("Could not load quiz {quiz_id}"))?;

    print!("{}", render::quiz_header(session.quiz(), session.questions().len(), session.attempts_used()));
    if session.is_preview() {
        println!("Preview mode: answers are scored locally and not recorded.");
    }
    if let Err(reason) = session.eligibility(now_utc()) {
        println!("{reason}");
        return Ok(());
    }
    if session.questions().is_empty() {
        println!("This quiz has no questions yet.");
        return Ok(());
    }

    session.start()?;
    let span = tracing::info_span!("attempt", quiz_id, attempt_id = %session.attempt_id());
    let report = drive(&session).instrument(span).await?;

    let Some(report) = report else {
        return Ok(());
    };
    print!("{}", render::format_report(&report));
    if let Some(review) = session.review(now_utc()) {
        print!("{}", render::format_review(&review));
    }
    Ok(())
}

/// Runs the prompt until the attempt is submitted or abandoned, then tears it down.
async fn drive(session: &AttemptSession) -> Result<Option<SubmitReport>> {
    let mut shutdown = shutdown_watch();
    let (mut snapshots, clock) = attempt_clock::spawn(session.clone(), shutdown.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock_running = true;
    let mut warned = false;

    println!("{HELP}");
    show_current(session);

    let report = loop {
        tokio::select! {
            changed = snapshots.changed(), if clock_running => {
                if changed.is_err() {
                    clock_running = false;
                    continue;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.auto_submitted {
                    println!("Time is up. Submitting your answers.");
                    break session.submit(SubmitTrigger::Timer).await;
                }
                if snapshot.low_time && !warned {
                    warned = true;
                    if let Some(remaining) = snapshot.remaining_seconds {
                        println!("{}", render::time_line(remaining, true));
                    }
                }
            }
            _ = shutdown.changed() => {
                println!("Leaving the quiz without submitting.");
                break None;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break None;
                };
                match parse_input(&line) {
                    Ok(Input::Submit) => break session.submit(SubmitTrigger::Manual).await,
                    Ok(Input::Quit) => break None,
                    Ok(input) => handle_input(session, input),
                    Err(message) => println!("{message}"),
                }
            }
        }
    };

    session.teardown();
    if let Err(err) = clock.await {
        tracing::error!(error = %err, "Attempt clock task join failed");
    }
    Ok(report)
}

fn handle_input(session: &AttemptSession, input: Input) {
    match input {
        Input::Next => {
            if !session.next() {
                println!("This is the last question. Type :submit when you are done.");
            }
            show_current(session);
        }
        Input::Previous => {
            if !session.previous() {
                println!("This is the first question.");
            }
            show_current(session);
        }
        Input::GoTo(index) => match session.go_to(index) {
            Ok(()) => show_current(session),
            Err(err) => println!("{err}"),
        },
        Input::Time => {
            let snapshot = session.timer_snapshot();
            match snapshot.remaining_seconds {
                Some(remaining) => println!("{}", render::time_line(remaining, snapshot.low_time)),
                None => println!("No time limit"),
            }
            println!("Answered {} of {}", session.answered_count(), session.questions().len());
        }
        Input::Help => println!("{HELP}"),
        Input::Answer(text) => {
            let Some(question) = session.current_question() else {
                return;
            };
            let choices = session.display_choices(&question.id);
            match render::parse_answer(question, choices.as_deref(), &text) {
                Ok(value) => match session.record_answer(&question.id, value) {
                    Ok(()) => {
                        if session.next() {
                            show_current(session);
                        } else {
                            println!("Answer saved. Type :submit when you are done.");
                        }
                    }
                    Err(err) => println!("{err}"),
                },
                Err(message) => println!("{message}"),
            }
        }
        Input::Submit | Input::Quit => {}
    }
}

fn show_current(session: &AttemptSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let choices = session.display_choices(&question.id);
    let current = session.answer(&question.id);
    print!(
        "{}",
        render::format_question(
            session.cursor(),
            session.questions().len(),
            question,
            choices.as_deref(),
            current.as_ref(),
        )
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_answers() {
        assert_eq!(parse_input(":next"), Ok(Input::Next));
        assert_eq!(parse_input(" :p "), Ok(Input::Previous));
        assert_eq!(parse_input(":go 3"), Ok(Input::GoTo(2)));
        assert_eq!(parse_input(":submit"), Ok(Input::Submit));
        assert_eq!(parse_input("Paris"), Ok(Input::Answer("Paris".to_string())));
        assert_eq!(parse_input("true"), Ok(Input::Answer("true".to_string())));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_input(":go").is_err());
        assert!(parse_input(":go 0").is_err());
        assert!(parse_input(":launch").is_err());
    }
}
