//! Terminal-failure handling.
//!
//! [`ErrorHandler`] is the entry point application code holds on to. It
//! owns the recent-error registry and the notifier, and every terminal
//! failure (retry budget exhausted, malformed validation payload, an
//! explicit `handle` call) flows through [`ErrorHandler::report_terminal`]:
//! one registry write, then one notification unless suppressed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::failure::{self, AppError, Normalization, RawFailure, DEFAULT_FALLBACK_MESSAGE};
use crate::fields::FieldErrorAggregator;
use crate::notify::{NotificationKind, Notifier};
use crate::registry::{ErrorRegistry, DEFAULT_CAPACITY};

/// Default time a failure notification stays on screen.
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

/// Per-call options for the terminal-failure path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleOptions {
    /// Show a notification. Callers with their own inline error UI turn this off.
    pub notify: bool,
    pub title: String,
    pub fallback_message: String,
    pub retryable: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            notify: true,
            title: "Error".to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            retryable: false,
        }
    }
}

impl HandleOptions {
    pub fn silent() -> Self {
        Self {
            notify: false,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_fallback(mut self, fallback_message: impl Into<String>) -> Self {
        self.fallback_message = fallback_message.into();
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    fn normalization(&self) -> Normalization {
        Normalization {
            fallback_message: self.fallback_message.clone(),
            retryable: self.retryable,
        }
    }
}

/// Construction-time settings for [`ErrorHandler`].
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub registry_capacity: usize,
    pub notification_duration: Duration,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            registry_capacity: DEFAULT_CAPACITY,
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
        }
    }
}

struct HandlerInner {
    registry: Mutex<ErrorRegistry>,
    notifier: Arc<dyn Notifier>,
    notification_duration: Duration,
}

/// Shared handle to the error handling subsystem. Cheap to clone.
#[derive(Clone)]
pub struct ErrorHandler {
    inner: Arc<HandlerInner>,
}

impl ErrorHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_settings(notifier, HandlerSettings::default())
    }

    pub fn with_settings(notifier: Arc<dyn Notifier>, settings: HandlerSettings) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                registry: Mutex::new(ErrorRegistry::new(settings.registry_capacity)),
                notifier,
                notification_duration: settings.notification_duration,
            }),
        }
    }

    /// Normalize a raw failure without any side effects.
    pub fn classify(&self, raw: Option<&RawFailure>) -> AppError {
        failure::classify(raw)
    }

    /// Normalize `raw` and run it through the terminal-failure path.
    pub fn handle(&self, raw: &RawFailure, options: &HandleOptions) -> AppError {
        let error = failure::classify_with(Some(raw), &options.normalization());
        self.report_terminal(error.clone(), options);
        error
    }

    /// Record an already-normalized error and notify the user.
    pub fn report_terminal(&self, error: AppError, options: &HandleOptions) {
        tracing::error!(
            error_type = %error.error_type(),
            code = ?error.code(),
            "{}",
            error.message()
        );

        let user_message = error.user_message().to_string();
        self.registry().record(error);

        if options.notify {
            self.inner.notifier.show(
                NotificationKind::Error,
                &options.title,
                Some(&user_message),
                Some(self.inner.notification_duration),
            );
        }
    }

    /// Recent errors of this session, oldest first.
    pub fn recent_errors(&self) -> Vec<AppError> {
        self.registry().list()
    }

    pub fn clear_recent_errors(&self) {
        self.registry().clear();
    }

    pub fn clear_recent_error(&self, timestamp: DateTime<Utc>) {
        self.registry().clear_one(timestamp);
    }

    /// Fresh per-form field error map wired to this handler.
    pub fn field_errors(&self) -> FieldErrorAggregator {
        FieldErrorAggregator::new(self.clone())
    }

    fn registry(&self) -> MutexGuard<'_, ErrorRegistry> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::recording_handler;
    use super::*;
    use crate::failure::ErrorType;

    #[test]
    fn handle_records_and_notifies_with_user_message() {
        let (handler, notifier) = recording_handler();
        let raw = RawFailure::http_status(401, "token expired");

        let error = handler.handle(&raw, &HandleOptions::default());

        assert_eq!(error.error_type(), ErrorType::Authentication);
        assert_eq!(handler.recent_errors(), vec![error.clone()]);

        let shown = notifier.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, NotificationKind::Error);
        assert_eq!(shown[0].message.as_deref(), Some(error.user_message()));
        assert_eq!(shown[0].duration, Some(DEFAULT_NOTIFICATION_DURATION));
    }

    #[test]
    fn notification_never_carries_raw_message() {
        let (handler, notifier) = recording_handler();
        let raw = RawFailure::http_status(500, "stack trace: db.rs:42 connection pool exhausted");

        handler.handle(&raw, &HandleOptions::default());

        let message = notifier.shown()[0].message.clone().unwrap();
        assert!(!message.contains("db.rs"));
    }

    #[test]
    fn silent_handle_records_without_notifying() {
        let (handler, notifier) = recording_handler();
        handler.handle(&RawFailure::new("boom"), &HandleOptions::silent());

        assert_eq!(handler.recent_errors().len(), 1);
        assert!(notifier.shown().is_empty());
    }

    #[test]
    fn classify_has_no_side_effects() {
        let (handler, notifier) = recording_handler();
        let error = handler.classify(Some(&RawFailure::http_status(404, "missing")));

        assert_eq!(error.error_type(), ErrorType::NotFound);
        assert!(handler.recent_errors().is_empty());
        assert!(notifier.shown().is_empty());
    }

    #[test]
    fn clear_recent_error_and_clear_all() {
        let (handler, _notifier) = recording_handler();
        let first = handler.handle(&RawFailure::new("one"), &HandleOptions::silent());
        handler.handle(&RawFailure::new("two"), &HandleOptions::silent());

        handler.clear_recent_error(first.timestamp());
        let remaining = handler.recent_errors();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message(), "two");

        handler.clear_recent_errors();
        assert!(handler.recent_errors().is_empty());
    }

    #[test]
    fn custom_title_and_fallback_reach_notification() {
        let (handler, notifier) = recording_handler();
        let options = HandleOptions::default()
            .with_title("Order failed")
            .with_fallback("We couldn't place your order.");

        let error = handler.handle(&RawFailure::new("???"), &options);

        assert_eq!(error.user_message(), "We couldn't place your order.");
        assert_eq!(notifier.shown()[0].title, "Order failed");
    }
}
