use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::schemas::answer::AnswerValue;

/// A quiz question as served by `GET /api/quizzes/{id}/questions`.
///
/// The `type` discriminant is resolved once here; unknown types decode to
/// [`QuestionKind::Unknown`] and score as incorrect instead of failing the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Rich-text prompt, kept as the editor's HTML.
    #[serde(rename = "question", alias = "prompt", default)]
    pub prompt: String,
    #[serde(default, deserialize_with = "deserialize_points")]
    pub points: f64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionKind {
    #[serde(rename = "multiple-choice")]
    MultipleChoice {
        #[serde(default)]
        choices: Vec<String>,
        #[serde(
            rename = "correctAnswer",
            default,
            deserialize_with = "deserialize_choice_key",
            skip_serializing_if = "Option::is_none"
        )]
        correct_answer: Option<usize>,
    },
    #[serde(rename = "true-false")]
    TrueFalse {
        #[serde(
            rename = "correctAnswer",
            default,
            deserialize_with = "deserialize_bool_key",
            skip_serializing_if = "Option::is_none"
        )]
        correct_answer: Option<bool>,
    },
    #[serde(rename = "fill-in-blank")]
    FillInBlank {
        /// Authoring writes `possibleAnswers`; some stored questions use the other name.
        #[serde(rename = "possibleAnswers", alias = "acceptableAnswers", default)]
        acceptable_answers: Vec<String>,
        #[serde(rename = "caseSensitive", default)]
        case_sensitive: bool,
    },
    #[serde(other)]
    Unknown,
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MultipleChoice { .. } => "multiple-choice",
            Self::TrueFalse { .. } => "true-false",
            Self::FillInBlank { .. } => "fill-in-blank",
            Self::Unknown => "unknown",
        }
    }
}

/// Body for creating or updating a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuestionDraft {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub title: String,
    #[serde(rename = "question")]
    pub prompt: String,
    #[validate(range(min = 0.0, message = "points must be non-negative"))]
    pub points: f64,
    #[serde(flatten)]
    #[validate(custom(function = validate_kind))]
    pub kind: QuestionKind,
}

fn validate_kind(kind: &QuestionKind) -> Result<(), ValidationError> {
    match kind {
        QuestionKind::MultipleChoice { choices, correct_answer } => {
            if choices.len() < 2 {
                return Err(ValidationError::new("choices_need_at_least_two"));
            }
            if choices.iter().any(|choice| choice.trim().is_empty()) {
                return Err(ValidationError::new("choice_cannot_be_empty"));
            }
            match correct_answer {
                Some(index) if *index < choices.len() => Ok(()),
                _ => Err(ValidationError::new("correct_answer_out_of_range")),
            }
        }
        QuestionKind::TrueFalse { correct_answer } => match correct_answer {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("correct_answer_required")),
        },
        QuestionKind::FillInBlank { acceptable_answers, .. } => {
            if acceptable_answers.iter().all(|answer| answer.trim().is_empty()) {
                return Err(ValidationError::new("acceptable_answers_cannot_be_empty"));
            }
            Ok(())
        }
        QuestionKind::Unknown => Err(ValidationError::new("unsupported_question_type")),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn deserialize_points<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    let points = match raw {
        Some(NumberOrText::Number(value)) => value,
        Some(NumberOrText::Text(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        None => 0.0,
    };

    Ok(if points.is_finite() && points > 0.0 { points } else { 0.0 })
}

fn deserialize_choice_key<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<AnswerValue>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(AnswerValue::as_choice_index))
}

fn deserialize_bool_key<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<AnswerValue>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(AnswerValue::as_bool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_each_question_type() {
        let raw = json!([
            {
                "_id": "q1",
                "title": "Spacing",
                "type": "multiple-choice",
                "question": "<p>Which property controls letter spacing?</p>",
                "points": 2,
                "choices": ["letter-spacing", "word-spacing"],
                "correctAnswer": 0,
                "quiz": "Z1"
            },
            { "_id": "q2", "title": "Labels", "type": "true-false", "points": 1, "correctAnswer": "true" },
            {
                "_id": "q3",
                "title": "Capital",
                "type": "fill-in-blank",
                "points": "3",
                "possibleAnswers": ["Paris"],
                "caseSensitive": false
            },
            { "_id": "q4", "type": "fill-in-blank", "acceptableAnswers": ["Lyon"] }
        ]);

        let questions: Vec<Question> = serde_json::from_value(raw).expect("questions");
        assert_eq!(
            questions[0].kind,
            QuestionKind::MultipleChoice {
                choices: vec!["letter-spacing".to_string(), "word-spacing".to_string()],
                correct_answer: Some(0),
            }
        );
        assert_eq!(questions[0].points, 2.0);
        assert_eq!(questions[1].kind, QuestionKind::TrueFalse { correct_answer: Some(true) });
        assert_eq!(
            questions[2].kind,
            QuestionKind::FillInBlank {
                acceptable_answers: vec!["Paris".to_string()],
                case_sensitive: false,
            }
        );
        assert_eq!(questions[2].points, 3.0);
        assert_eq!(
            questions[3].kind,
            QuestionKind::FillInBlank {
                acceptable_answers: vec!["Lyon".to_string()],
                case_sensitive: false,
            }
        );
    }

    #[test]
    fn malformed_question_degrades_instead_of_failing() {
        let raw = json!([
            { "_id": "q1", "type": "multiple-choice", "points": -4 },
            { "_id": "q2", "type": "essay", "points": 5 }
        ]);

        let questions: Vec<Question> = serde_json::from_value(raw).expect("questions");
        assert_eq!(
            questions[0].kind,
            QuestionKind::MultipleChoice { choices: vec![], correct_answer: None }
        );
        assert_eq!(questions[0].points, 0.0);
        assert_eq!(questions[1].kind, QuestionKind::Unknown);
    }

    #[test]
    fn draft_serializes_wire_field_names() {
        let draft = QuestionDraft {
            title: "Capital".to_string(),
            prompt: "<p>Capital of France?</p>".to_string(),
            points: 3.0,
            kind: QuestionKind::FillInBlank {
                acceptable_answers: vec!["Paris".to_string()],
                case_sensitive: true,
            },
        };

        let value = serde_json::to_value(&draft).expect("draft json");
        assert_eq!(value["type"], "fill-in-blank");
        assert_eq!(value["question"], "<p>Capital of France?</p>");
        assert_eq!(value["possibleAnswers"], json!(["Paris"]));
        assert!(value.get("acceptableAnswers").is_none());
        assert_eq!(value["caseSensitive"], true);
    }

    #[test]
    fn draft_validation_rejects_out_of_range_choice() {
        let draft = QuestionDraft {
            title: "Pick".to_string(),
            prompt: String::new(),
            points: 1.0,
            kind: QuestionKind::MultipleChoice {
                choices: vec!["A".to_string(), "B".to_string()],
                correct_answer: Some(2),
            },
        };
        assert!(draft.validate().is_err());

        let fixed = QuestionDraft {
            kind: QuestionKind::MultipleChoice {
                choices: vec!["A".to_string(), "B".to_string()],
                correct_answer: Some(1),
            },
            ..draft
        };
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn draft_validation_rejects_negative_points_and_blank_answers() {
        let draft = QuestionDraft {
            title: "Blank".to_string(),
            prompt: String::new(),
            points: -1.0,
            kind: QuestionKind::FillInBlank {
                acceptable_answers: vec!["Paris".to_string()],
                case_sensitive: false,
            },
        };
        assert!(draft.validate().is_err());

        let blank = QuestionDraft {
            points: 1.0,
            kind: QuestionKind::FillInBlank {
                acceptable_answers: vec!["  ".to_string()],
                case_sensitive: false,
            },
            ..draft
        };
        assert!(blank.validate().is_err());
    }
}
