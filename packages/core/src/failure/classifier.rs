//! Failure classification.
//!
//! Maps a [`RawFailure`] onto exactly one [`ErrorType`] and builds the
//! normalized [`AppError`]. Precedence, first match wins:
//!
//! 1. transport fault → `NETWORK`
//! 2. status code: 401, 403, 404, other 4xx, 5xx
//! 3. validation kind → `VALIDATION`
//! 4. anything else → `UNKNOWN`

use crate::failure::messages::{synthesize, DEFAULT_FALLBACK_MESSAGE};
use crate::failure::raw::{FailureKind, RawFailure};
use crate::failure::types::{AppError, ErrorCode, ErrorType};

/// Caller intent applied while normalizing a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalization {
    pub fallback_message: String,
    pub retryable: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            retryable: false,
        }
    }
}

impl Normalization {
    pub fn with_fallback(fallback_message: impl Into<String>) -> Self {
        Self {
            fallback_message: fallback_message.into(),
            ..Self::default()
        }
    }
}

/// Classify a failure. Never panics; absent input is `UNKNOWN`.
pub fn error_type_of(raw: Option<&RawFailure>) -> ErrorType {
    let Some(raw) = raw else {
        return ErrorType::Unknown;
    };

    if raw.transport.is_some() {
        return ErrorType::Network;
    }

    if let Some(status) = raw.transport_status {
        match status {
            401 => return ErrorType::Authentication,
            403 => return ErrorType::Authorization,
            404 => return ErrorType::NotFound,
            400..=499 => return ErrorType::Client,
            500..=u16::MAX => return ErrorType::Server,
            _ => {}
        }
    }

    if raw.kind == Some(FailureKind::Validation) {
        return ErrorType::Validation;
    }

    ErrorType::Unknown
}

/// Normalize a failure with the default fallback message.
pub fn classify(raw: Option<&RawFailure>) -> AppError {
    classify_with(raw, &Normalization::default())
}

/// Normalize a failure with caller-supplied fallback and retry intent.
pub fn classify_with(raw: Option<&RawFailure>, normalization: &Normalization) -> AppError {
    let error_type = error_type_of(raw);
    build(error_type, raw, normalization)
}

/// Build an [`AppError`] of a fixed type, bypassing precedence rules.
/// Used where the source of a failure already dictates its type.
pub fn normalize_as(
    error_type: ErrorType,
    raw: Option<&RawFailure>,
    normalization: &Normalization,
) -> AppError {
    build(error_type, raw, normalization)
}

fn build(error_type: ErrorType, raw: Option<&RawFailure>, normalization: &Normalization) -> AppError {
    let message = raw
        .map(RawFailure::message_or_default)
        .unwrap_or_else(|| "No failure information available".to_string());
    let user_message = synthesize(error_type, &normalization.fallback_message);

    let mut error =
        AppError::new(error_type, message, user_message).with_retryable(normalization.retryable);

    if let Some(raw) = raw {
        let code = raw
            .code
            .clone()
            .or_else(|| raw.transport_status.map(ErrorCode::from));
        if let Some(code) = code {
            error = error.with_code(code);
        }
        if let Some(details) = raw.details.clone() {
            error = error.with_details(details);
        }
    }

    error
}
