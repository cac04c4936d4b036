//! User-safe message table.

use crate::failure::types::ErrorType;

/// Message used when neither the table nor the caller supplies one.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

impl ErrorType {
    /// Fixed user-facing message for this type, if one is bound.
    ///
    /// The match has no wildcard arm: a new variant does not compile
    /// until it is given a binding here.
    pub fn default_message(self) -> Option<&'static str> {
        match self {
            ErrorType::Network => {
                Some("Unable to connect. Please check your internet connection and try again.")
            }
            ErrorType::Authentication => Some("Your session has expired. Please log in again."),
            ErrorType::Authorization => Some("You don't have permission to perform this action."),
            ErrorType::NotFound => Some("The requested item is no longer available."),
            ErrorType::Validation => Some("Please check your input and try again."),
            ErrorType::Server => {
                Some("Our service is temporarily unavailable. Please try again in a few minutes.")
            }
            ErrorType::Client => None,
            ErrorType::Unknown => None,
        }
    }
}

/// Resolve the user-facing message for `error_type`, falling back to
/// `fallback` for types without a binding.
pub fn synthesize(error_type: ErrorType, fallback: &str) -> String {
    error_type
        .default_message()
        .unwrap_or(fallback)
        .to_string()
}
