//! Persisted error reports.
//!
//! [`ErrorReporter::report`] serializes an [`AppError`] together with its
//! context, the current navigation location and a client fingerprint,
//! and appends it to a JSON ring buffer stored under [`REPORTS_KEY`].
//! Reporting never fails from the caller's point of view: persistence
//! problems are logged and dropped.
//!
//! A [`RemoteSink`] may be attached to forward every report off-device.
//! Without one, reports stay local.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::failure::AppError;
use crate::storage::KeyValueStore;

/// Storage key of the persisted ring buffer.
pub const REPORTS_KEY: &str = "error_reports";

/// Maximum number of persisted reports.
pub const MAX_PERSISTED_REPORTS: usize = 50;

/// Circumstances under which a failure was reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportContext {
    /// A spawned task failed and nobody observed the result.
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection,
    /// A panic escaped to the process panic hook.
    #[serde(rename = "javascriptError")]
    UncaughtError {
        location: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },
    /// Reported explicitly by application code.
    Custom {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

impl ReportContext {
    pub fn custom(label: impl Into<String>) -> Self {
        Self::Custom {
            label: label.into(),
            data: None,
        }
    }
}

/// A single persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: AppError,
    pub context: ReportContext,
    /// Navigation target the user was on when the failure happened.
    pub location: Option<String>,
    pub fingerprint: String,
    pub reported_at: DateTime<Utc>,
}

/// Identifies the client build and platform in every report.
pub fn client_fingerprint() -> String {
    format!(
        "{}/{} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Off-device destination for error reports.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    async fn submit(&self, report: &ErrorReport) -> CoreResult<()>;

    /// Name of this sink for logging.
    fn name(&self) -> &str;
}

/// Posts each report as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    http: Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteSink for WebhookSink {
    async fn submit(&self, report: &ErrorReport) -> CoreResult<()> {
        let response = self.http.post(&self.url).json(report).send().await?;

        if !response.status().is_success() {
            return Err(CoreError::RemoteStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

thread_local! {
    static PERSISTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as writing the report buffer. A panic inside
/// the store reaches the panic hook on this same thread, and the capture
/// listener must not re-enter the write lock from there.
struct PersistGuard;

impl PersistGuard {
    fn enter() -> Option<Self> {
        PERSISTING.with(|persisting| {
            if persisting.replace(true) {
                None
            } else {
                Some(PersistGuard)
            }
        })
    }
}

impl Drop for PersistGuard {
    fn drop(&mut self) {
        PERSISTING.with(|persisting| persisting.set(false));
    }
}

pub struct ErrorReporter {
    storage: Arc<dyn KeyValueStore>,
    sink: Option<Arc<dyn RemoteSink>>,
    location: RwLock<Option<String>>,
    fingerprint: String,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl ErrorReporter {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            sink: None,
            location: RwLock::new(None),
            fingerprint: client_fingerprint(),
            capacity: MAX_PERSISTED_REPORTS,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RemoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Update the navigation target attached to subsequent reports.
    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = Some(location.into());
    }

    pub fn location(&self) -> Option<String> {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `error` in the persisted ring buffer. Never fails.
    pub fn report(&self, error: &AppError, context: ReportContext) {
        let report = ErrorReport {
            error: error.clone(),
            context,
            location: self.location(),
            fingerprint: self.fingerprint.clone(),
            reported_at: Utc::now(),
        };

        let Some(_persisting) = PersistGuard::enter() else {
            tracing::warn!(
                error_type = %error.error_type(),
                "Error report raised while persisting another; dropping it"
            );
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.persist(&report))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!("Failed to persist error report: {}", err),
            Err(_) => tracing::error!("Error report storage panicked; report dropped"),
        }

        self.submit_remote(report);
    }

    /// Persisted reports, oldest first.
    pub fn reports(&self) -> CoreResult<Vec<ErrorReport>> {
        match self.storage.get(REPORTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn clear(&self) -> CoreResult<()> {
        let _persisting = PersistGuard::enter();
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.storage.remove(REPORTS_KEY)
    }

    fn persist(&self, report: &ErrorReport) -> CoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut reports = match self.reports() {
            Ok(reports) => reports,
            Err(CoreError::Serialize(err)) => {
                tracing::warn!("Discarding unreadable error report buffer: {}", err);
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        reports.push(report.clone());
        if reports.len() > self.capacity {
            let overflow = reports.len() - self.capacity;
            reports.drain(..overflow);
        }

        let serialized = serde_json::to_string(&reports)?;
        self.storage.set(REPORTS_KEY, &serialized)
    }

    fn submit_remote(&self, report: ErrorReport) {
        let Some(sink) = self.sink.clone() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping remote submission to {}", sink.name());
            return;
        };

        runtime.spawn(async move {
            if let Err(err) = sink.submit(&report).await {
                tracing::warn!("Remote error sink '{}' failed: {}", sink.name(), err);
            }
        });
    }
}
