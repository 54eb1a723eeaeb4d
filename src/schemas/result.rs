use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::time::{deserialize_option_offset_datetime_flexible, serialize_offset, serialize_option_offset};
use crate::schemas::answer::AnswerValue;

/// One scored answer inside a result, in question order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    #[serde(default)]
    pub answer: Option<AnswerValue>,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub points_earned: f64,
}

/// Body of `POST /api/quizzes/{quizId}/results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizResult {
    pub student_id: String,
    pub course_id: String,
    pub answers: Vec<AnswerRecord>,
    pub score: f64,
    pub total_points: f64,
    pub time_spent: u64,
    #[serde(serialize_with = "serialize_offset")]
    pub started_at: OffsetDateTime,
    #[serde(serialize_with = "serialize_offset")]
    pub submitted_at: OffsetDateTime,
}

/// A persisted attempt as returned by the results endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "quizId", skip_serializing_if = "Option::is_none")]
    pub quiz: Option<String>,
    #[serde(default)]
    pub student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub total_points: f64,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_option_offset_datetime_flexible",
        serialize_with = "serialize_option_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<OffsetDateTime>,
    /// Older records were stored without it.
    #[serde(
        default,
        deserialize_with = "deserialize_option_offset_datetime_flexible",
        serialize_with = "serialize_option_offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_at: Option<OffsetDateTime>,
}

impl QuizResult {
    pub fn percentage(&self) -> u32 {
        score_percentage(self.score, self.total_points)
    }
}

pub fn score_percentage(score: f64, total_points: f64) -> u32 {
    if total_points <= 0.0 {
        return 0;
    }
    (score / total_points * 100.0).round().clamp(0.0, 100.0) as u32
}
