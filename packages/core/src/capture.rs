//! Capture of failures the application never handled.
//!
//! [`HostSignals`] is where the runtime announces two kinds of failure:
//!
//! - **unhandled rejection**: a task started through [`HostSignals::spawn`]
//!   finished with `Err` and nobody was awaiting it;
//! - **uncaught error**: a panic reached the process panic hook
//!   (once [`HostSignals::forward_panics`] has chained it).
//!
//! [`GlobalFailureCapture`] subscribes to both and forwards them to the
//! [`ErrorReporter`]. It never notifies the user: these failures did not
//! come from an action the user initiated.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock, PoisonError, RwLock};

use tokio::task::JoinHandle;

use crate::failure::{normalize_as, AppError, AsRawFailure, ErrorType, Normalization, RawFailure};
use crate::handler::ErrorHandler;
use crate::reporter::{ErrorReporter, ReportContext};

/// A panic as observed by the process panic hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncaughtFailure {
    pub message: String,
    pub location: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

type RejectionListener = Arc<dyn Fn(&RawFailure) + Send + Sync>;
type UncaughtListener = Arc<dyn Fn(&UncaughtFailure) + Send + Sync>;

static PROCESS_SIGNALS: OnceLock<Arc<HostSignals>> = OnceLock::new();
static PANIC_HOOK: Once = Once::new();

#[derive(Default)]
pub struct HostSignals {
    rejection_listeners: RwLock<Vec<RejectionListener>>,
    uncaught_listeners: RwLock<Vec<UncaughtListener>>,
}

impl HostSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shared by the whole process. Panics are forwarded here.
    pub fn process() -> Arc<HostSignals> {
        PROCESS_SIGNALS
            .get_or_init(|| Arc::new(HostSignals::new()))
            .clone()
    }

    /// Chain the process panic hook so panics are emitted as uncaught
    /// errors on [`HostSignals::process`]. The previous hook still runs.
    /// Only the first call has an effect.
    pub fn forward_panics() {
        PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let failure = UncaughtFailure {
                    message: panic_message(info.payload()),
                    location: info.location().map(|l| l.file().to_string()),
                    line: info.location().map(|l| l.line()),
                    column: info.location().map(|l| l.column()),
                };
                HostSignals::process().emit_uncaught_error(&failure);
                previous(info);
            }));
            tracing::debug!("Panic hook chained to host signals");
        });
    }

    pub fn on_unhandled_rejection<L>(&self, listener: L)
    where
        L: Fn(&RawFailure) + Send + Sync + 'static,
    {
        self.rejection_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn on_uncaught_error<L>(&self, listener: L)
    where
        L: Fn(&UncaughtFailure) + Send + Sync + 'static,
    {
        self.uncaught_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Total listeners registered across both signals.
    pub fn listener_count(&self) -> usize {
        let rejections = self
            .rejection_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let uncaught = self
            .uncaught_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        rejections + uncaught
    }

    pub fn emit_unhandled_rejection(&self, reason: &RawFailure) {
        // Snapshot so listeners may register further listeners.
        let listeners = self
            .rejection_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(reason);
        }
    }

    pub fn emit_uncaught_error(&self, failure: &UncaughtFailure) {
        let listeners = self
            .uncaught_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(failure);
        }
    }

    /// Spawn a fire-and-forget task. An `Err` outcome is emitted as an
    /// unhandled rejection.
    pub fn spawn<F, T, E>(self: &Arc<Self>, future: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: AsRawFailure + Send + 'static,
    {
        let signals = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = future.await {
                signals.emit_unhandled_rejection(&err.as_raw_failure());
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Normalize an unhandled rejection. Always `UNKNOWN`.
pub fn rejection_error(reason: &RawFailure) -> AppError {
    normalize_as(ErrorType::Unknown, Some(reason), &Normalization::default())
}

/// Normalize an uncaught error. Always `CLIENT`.
pub fn uncaught_error(failure: &UncaughtFailure) -> AppError {
    let raw = RawFailure::new(failure.message.clone());
    normalize_as(ErrorType::Client, Some(&raw), &Normalization::default())
}

/// Subscribes the error reporter to [`HostSignals`], at most once.
pub struct GlobalFailureCapture {
    reporter: Arc<ErrorReporter>,
    installed: AtomicBool,
}

impl GlobalFailureCapture {
    pub fn new(reporter: Arc<ErrorReporter>) -> Self {
        Self {
            reporter,
            installed: AtomicBool::new(false),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Register both listeners on `signals`. Returns `false`, doing
    /// nothing, if this capture was already installed.
    pub fn install(&self, signals: &HostSignals) -> bool {
        if self.installed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Global failure capture already installed");
            return false;
        }

        let reporter = Arc::clone(&self.reporter);
        signals.on_unhandled_rejection(move |reason| {
            let error = rejection_error(reason);
            tracing::warn!("Unhandled rejection: {}", error.message());
            reporter.report(&error, ReportContext::UnhandledRejection);
        });

        let reporter = Arc::clone(&self.reporter);
        signals.on_uncaught_error(move |failure| {
            let error = uncaught_error(failure);
            tracing::error!(
                location = ?failure.location,
                line = ?failure.line,
                "Uncaught error: {}",
                error.message()
            );
            reporter.report(
                &error,
                ReportContext::UncaughtError {
                    location: failure.location.clone(),
                    line: failure.line,
                    column: failure.column,
                },
            );
        });

        tracing::info!("Global failure capture installed");
        true
    }
}

impl ErrorHandler {
    /// Application-level entry point for global capture. Returns `false`
    /// if `capture` was already installed.
    pub fn install_global_capture(
        &self,
        capture: &GlobalFailureCapture,
        signals: &HostSignals,
    ) -> bool {
        capture.install(signals)
    }
}
