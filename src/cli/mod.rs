use anyhow::{anyhow, Result};

mod history;
mod render;
mod take;

use crate::core::state::AppState;

const USAGE: &str = "usage: kambaz-quiz <take|history> <quizId>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Take { quiz_id: String },
    History { quiz_id: String },
    Help,
}

pub(crate) fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    let command = match command.as_str() {
        "-h" | "--help" | "help" => return Ok(Command::Help),
        "take" => {
            Command::Take { quiz_id: args.next().ok_or_else(|| anyhow!("take: missing quizId"))? }
        }
        "history" => Command::History {
            quiz_id: args.next().ok_or_else(|| anyhow!("history: missing quizId"))?,
        },
        other => return Err(anyhow!("Unknown command: {other}\n{USAGE}")),
    };

    if let Some(extra) = args.next() {
        return Err(anyhow!("Unexpected argument: {extra}\n{USAGE}"));
    }
    Ok(command)
}

pub(crate) async fn dispatch(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Take { quiz_id } => take::run(state, &quiz_id).await,
        Command::History { quiz_id } => history::run(state, &quiz_id).await,
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}
