// Library root. The diagnostics binary in `src/main.rs` and the
// integration tests in `tests/` both build on these modules.

pub mod capture;
pub mod error;
pub mod failure;
pub mod fields;
pub mod handler;
pub mod notify;
pub mod registry;
pub mod reporter;
pub mod retry;
pub mod storage;

// Binary plumbing.
pub mod cli;
pub mod config;
pub mod logging;

pub use capture::{GlobalFailureCapture, HostSignals};
pub use error::{CoreError, CoreResult};
pub use failure::{AppError, AsRawFailure, ErrorCode, ErrorType, RawFailure};
pub use fields::FieldErrorAggregator;
pub use handler::{ErrorHandler, HandleOptions};
pub use notify::{NotificationKind, Notifier};
pub use registry::ErrorRegistry;
pub use reporter::{ErrorReport, ErrorReporter, RemoteSink, ReportContext};
pub use retry::{CancellationHandle, CancellationToken, RetryError, RetryOptions};
