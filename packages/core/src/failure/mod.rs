//! Failure normalization
//!
//! Turns raw failures from the HTTP client, storage and validation layers
//! into classified, user-safe [`AppError`] values.

pub mod classifier;
pub mod messages;
pub mod raw;
pub mod types;

pub use classifier::{classify, classify_with, error_type_of, normalize_as, Normalization};
pub use messages::{synthesize, DEFAULT_FALLBACK_MESSAGE};
pub use raw::{AsRawFailure, FailureKind, RawFailure, TransportFault};
pub use types::{AppError, ErrorCode, ErrorType};
