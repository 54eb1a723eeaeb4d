use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::core::time::{deserialize_option_offset_datetime_flexible, serialize_option_offset};
use crate::schemas::answer::AnswerValue;

/// Minutes applied when a time limit is enabled without a value.
pub const DEFAULT_TIME_LIMIT_MINUTES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuizType {
    #[default]
    #[serde(rename = "Graded Quiz")]
    GradedQuiz,
    #[serde(rename = "Practice Quiz")]
    PracticeQuiz,
    #[serde(rename = "Graded Survey")]
    GradedSurvey,
    #[serde(rename = "Ungraded Survey")]
    UngradedSurvey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub course: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
    #[serde(default)]
    pub quiz_type: QuizType,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub shuffle_answers: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub time_limit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub multiple_attempts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_many_attempts: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_option_offset_datetime_flexible",
        serialize_with = "serialize_option_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub available_from_date: Option<OffsetDateTime>,
    #[serde(
        default,
        deserialize_with = "deserialize_option_offset_datetime_flexible",
        serialize_with = "serialize_option_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub available_until_date: Option<OffsetDateTime>,
    #[serde(
        default,
        deserialize_with = "deserialize_option_offset_datetime_flexible",
        serialize_with = "serialize_option_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default = "default_show_correct_answers", deserialize_with = "deserialize_show_flag")]
    pub show_correct_answers: bool,
}

impl Quiz {
    /// Time limit in seconds, `None` when the quiz is untimed.
    pub fn time_limit_seconds(&self) -> Option<u64> {
        if !self.time_limit {
            return None;
        }
        let minutes = self.time_limit_minutes.unwrap_or(DEFAULT_TIME_LIMIT_MINUTES);
        Some(u64::from(minutes) * 60)
    }

    /// Attempts a student may use. Single-attempt quizzes allow exactly one.
    pub fn attempt_limit(&self) -> u32 {
        if self.multiple_attempts {
            self.how_many_attempts.unwrap_or(1).max(1)
        } else {
            1
        }
    }

    /// End of the submission window: the due date, falling back to the lock date.
    pub fn closes_at(&self) -> Option<OffsetDateTime> {
        self.due_date.or(self.available_until_date)
    }
}

fn default_show_correct_answers() -> bool {
    true
}

// Flags arrive as booleans, "true"/"false" strings or 0/1 from older editors.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<AnswerValue>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(AnswerValue::as_bool).unwrap_or(false))
}

// Besides booleans, the editor stores labels such as "Immediately" or "Never".
fn deserialize_show_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<AnswerValue>::deserialize(deserializer)?;
    Ok(match raw {
        None => true,
        Some(AnswerValue::Text(label)) if label.trim().eq_ignore_ascii_case("never") => false,
        Some(AnswerValue::Text(label)) if label.trim().eq_ignore_ascii_case("no") => false,
        Some(value) => value.as_bool().unwrap_or(true),
    })
}
