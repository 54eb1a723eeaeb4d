use thiserror::Error;
use time::OffsetDateTime;

use crate::core::time::format_due;
use crate::schemas::quiz::Quiz;

/// Why a student may not start an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("This quiz is not published yet")]
    Unpublished,
    #[error("This quiz is not available until {}", display_date(.opens_at))]
    NotYetAvailable { opens_at: OffsetDateTime },
    #[error("This quiz closed {}", display_date(.closed_at))]
    Closed { closed_at: OffsetDateTime },
    #[error("You have used all {limit} allowed attempt(s) for this quiz")]
    AttemptsExhausted { used: u32, limit: u32 },
}

fn display_date(value: &OffsetDateTime) -> String {
    format_due(*value)
}

/// Checks run in a fixed order so the first blocking reason is reported.
pub fn check_eligibility(quiz: &Quiz, attempts_used: u32, now: OffsetDateTime) -> Result<(), Ineligible> {
    if !quiz.published {
        return Err(Ineligible::Unpublished);
    }
    if let Some(opens_at) = quiz.available_from_date {
        if now < opens_at {
            return Err(Ineligible::NotYetAvailable { opens_at });
        }
    }
    if let Some(closed_at) = quiz.closes_at() {
        if now > closed_at {
            return Err(Ineligible::Closed { closed_at });
        }
    }
    let limit = quiz.attempt_limit();
    if attempts_used >= limit {
        return Err(Ineligible::AttemptsExhausted { used: attempts_used, limit });
    }
    Ok(())
}
