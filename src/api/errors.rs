use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} responded with status {status}: {detail}")]
    Status { path: String, status: StatusCode, detail: String },
    #[error("{path} returned an unexpected body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pulls a readable message out of an error body; the server has no error-code taxonomy.
pub(crate) fn extract_error_message(raw_body: &str) -> String {
    let Ok(payload) = serde_json::from_str::<Value>(raw_body) else {
        let trimmed = raw_body.trim();
        return if trimmed.is_empty() { "no details".to_string() } else { trimmed.to_string() };
    };

    if let Some(text) = payload.as_str() {
        return text.to_string();
    }

    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_error_message_prefers_known_fields() {
        assert_eq!(extract_error_message(r#"{"message":"Quiz not found"}"#), "Quiz not found");
        assert_eq!(extract_error_message(r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(extract_error_message(r#"{"detail":"Bad id"}"#), "Bad id");
        assert_eq!(extract_error_message(r#""plain json string""#), "plain json string");
        assert_eq!(extract_error_message(r#"{"other":1}"#), "unknown_error");
    }

    #[test]
    fn extract_error_message_handles_non_json() {
        assert_eq!(extract_error_message("Not Found"), "Not Found");
        assert_eq!(extract_error_message("   "), "no details");
    }
}
