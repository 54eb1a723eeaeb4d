use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A raw answer as produced by a form control.
///
/// Radio groups, checkboxes and text inputs encode the same answer differently
/// (`1`, `"1"`, `true`, `"true"`); the evaluator normalizes per question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AnswerValue {
    /// Empty strings count as "no answer", matching an untouched text input.
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }

    /// Integer coercion for choice keys. Booleans are never indices.
    pub fn as_choice_index(&self) -> Option<usize> {
        match self {
            Self::Integer(value) => usize::try_from(*value).ok(),
            Self::Float(value) if value.is_finite() && value.fract() == 0.0 && *value >= 0.0 => {
                Some(*value as usize)
            }
            Self::Text(text) => text.trim().parse::<usize>().ok(),
            Self::Bool(_) | Self::Float(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(1) => Some(true),
            Self::Integer(0) => Some(false),
            Self::Float(value) if *value == 1.0 => Some(true),
            Self::Float(value) if *value == 0.0 => Some(false),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Self::Integer(_) | Self::Float(_) => None,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Bool(value) => Cow::Owned(value.to_string()),
            Self::Integer(value) => Cow::Owned(value.to_string()),
            Self::Float(value) => Cow::Owned(value.to_string()),
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for AnswerValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map(Self::Integer).unwrap_or(Self::Float(value as f64))
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
