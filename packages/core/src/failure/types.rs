//! Normalized failure value types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Network,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Server,
    Client,
    Unknown,
}

impl ErrorType {
    pub const ALL: [ErrorType; 8] = [
        ErrorType::Network,
        ErrorType::Validation,
        ErrorType::Authentication,
        ErrorType::Authorization,
        ErrorType::NotFound,
        ErrorType::Server,
        ErrorType::Client,
        ErrorType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Network => "NETWORK",
            ErrorType::Validation => "VALIDATION",
            ErrorType::Authentication => "AUTHENTICATION",
            ErrorType::Authorization => "AUTHORIZATION",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Server => "SERVER",
            ErrorType::Client => "CLIENT",
            ErrorType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable identifier carried alongside a failure
/// (usually the transport status code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Numeric(code) => write!(f, "{}", code),
            ErrorCode::Text(code) => f.write_str(code),
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(status: u16) -> Self {
        ErrorCode::Numeric(i64::from(status))
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::Text(code.to_string())
    }
}

/// Normalized, immutable description of a failure.
///
/// `user_message` is always populated, so UI code can render it
/// without a fallback of its own. `details` is diagnostic payload and is
/// never part of the `Display` output.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{error_type}: {message}")]
pub struct AppError {
    #[serde(rename = "type")]
    error_type: ErrorType,
    message: String,
    user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    timestamp: DateTime<Utc>,
    retryable: bool,
}

impl AppError {
    /// Create an error stamped with the current time. Further fields are
    /// attached with the consuming `with_*` methods before the value is
    /// handed out.
    pub fn new(
        error_type: ErrorType,
        message: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            user_message: user_message.into(),
            code: None,
            details: None,
            timestamp: Utc::now(),
            retryable: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Creation time; also the identity key inside the recent-error registry.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorType::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }

    #[test]
    fn app_error_serializes_type_field_and_skips_empty_optionals() {
        let err = AppError::new(ErrorType::Server, "HTTP 503", "try later");
        let value = serde_json::to_value(&err).unwrap();

        assert_eq!(value["type"], "SERVER");
        assert_eq!(value["userMessage"], serde_json::Value::Null);
        assert_eq!(value["user_message"], "try later");
        assert!(value.get("code").is_none());
        assert!(value.get("details").is_none());
    }

    #[test]
    fn code_round_trips_untagged() {
        let err = AppError::new(ErrorType::NotFound, "missing", "gone")
            .with_code(404u16)
            .with_details(serde_json::json!({ "path": "/menu/42" }));
        let json = serde_json::to_string(&err).unwrap();
        let back: AppError = serde_json::from_str(&json).unwrap();

        assert_eq!(back.code(), Some(&ErrorCode::Numeric(404)));
        assert_eq!(back, err);
    }

    #[test]
    fn display_never_includes_details_or_user_message() {
        let err = AppError::new(ErrorType::Client, "bad request body", "friendly")
            .with_details(serde_json::json!({ "secret": "token-123" }));
        let shown = err.to_string();

        assert_eq!(shown, "CLIENT: bad request body");
        assert!(!shown.contains("token-123"));
    }
}
