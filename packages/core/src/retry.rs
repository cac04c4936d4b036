//! Bounded retry with exponential backoff.
//!
//! [`ErrorHandler::execute_with_retry`] runs an async operation up to
//! `max_retries + 1` times, sleeping `base_delay * 2^attempt` between
//! attempts (attempt is 0-indexed). A terminal failure is normalized,
//! recorded and notified exactly once, then handed back to the caller
//! unchanged.
//!
//! [`ErrorHandler::execute_with_retry_cancellable`] additionally accepts a
//! [`CancellationToken`] that is checked before every attempt and raced
//! against every backoff sleep.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::failure::{error_type_of, AsRawFailure, ErrorType, RawFailure};
use crate::handler::{ErrorHandler, HandleOptions};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Decides whether a failed attempt warrants another one.
pub type RetryPredicate = Arc<dyn Fn(&RawFailure) -> bool + Send + Sync>;

/// Default predicate: retry connection-level failures only.
pub fn retry_network(raw: &RawFailure) -> bool {
    error_type_of(Some(raw)) == ErrorType::Network
}

/// Retry connection-level failures and server-side outages.
pub fn retry_transient(raw: &RawFailure) -> bool {
    matches!(
        error_type_of(Some(raw)),
        ErrorType::Network | ErrorType::Server
    )
}

#[derive(Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retry_predicate: RetryPredicate,
    /// Applied once, to the terminal failure.
    pub handling: HandleOptions,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            retry_predicate: Arc::new(retry_network),
            handling: HandleOptions::default(),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("handling", &self.handling)
            .finish_non_exhaustive()
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_retry_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RawFailure) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Arc::new(predicate);
        self
    }

    pub fn with_handling(mut self, handling: HandleOptions) -> Self {
        self.handling = handling;
        self
    }

    /// Keep the terminal failure out of the notification layer.
    pub fn without_notification(mut self) -> Self {
        self.handling.notify = false;
        self
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn should_retry(&self, attempt: u32, raw: &RawFailure) -> bool {
        attempt < self.max_retries && (self.retry_predicate)(raw)
    }
}

/// Failure of a cancellable retry run.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Retries stopped; carries the original failure of the last attempt.
    #[error("{0}")]
    Exhausted(E),

    /// The caller cancelled before the run finished.
    #[error("retry cancelled")]
    Cancelled { last_error: Option<E> },
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The underlying failure, if any attempt was made.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted(err) => Some(err),
            RetryError::Cancelled { last_error } => last_error,
        }
    }
}

/// Observes cancellation of a retry run.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
}

/// Triggers cancellation for all clones of its token.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationToken {
    pub fn new() -> (Self, CancellationHandle) {
        let (sender, receiver) = watch::channel(false);
        (Self { receiver }, CancellationHandle { sender })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested. A dropped handle can never
    /// cancel, so this then stays pending.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Why a retry loop stopped without a success. Both carry the error of
/// the last attempt; a run cancelled before its first attempt never
/// reaches the loop.
enum Stop<E> {
    Exhausted(E),
    Cancelled(E),
}

impl ErrorHandler {
    /// Run `operation` with bounded exponential-backoff retry.
    ///
    /// Returns the first success, or the original error of the final
    /// attempt after recording and notifying it.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        options: RetryOptions,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsRawFailure,
    {
        self.retry_loop(operation, &options, None)
            .await
            .map_err(|stop| match stop {
                Stop::Exhausted(err) | Stop::Cancelled(err) => err,
            })
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but stops as
    /// soon as `token` is cancelled. A cancelled run has no registry or
    /// notification side effects.
    pub async fn execute_with_retry_cancellable<T, E, F, Fut>(
        &self,
        operation: F,
        options: RetryOptions,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsRawFailure,
    {
        if token.is_cancelled() {
            tracing::debug!("Retry cancelled before first attempt");
            return Err(RetryError::Cancelled { last_error: None });
        }

        self.retry_loop(operation, &options, Some(token))
            .await
            .map_err(|stop| match stop {
                Stop::Exhausted(err) => RetryError::Exhausted(err),
                Stop::Cancelled(err) => RetryError::Cancelled {
                    last_error: Some(err),
                },
            })
    }

    async fn retry_loop<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: &RetryOptions,
        token: Option<&CancellationToken>,
    ) -> Result<T, Stop<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsRawFailure,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let raw = err.as_raw_failure();
            if !options.should_retry(attempt, &raw) {
                self.handle(&raw, &options.handling);
                return Err(Stop::Exhausted(err));
            }

            let delay = options.delay_for(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries = options.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Attempt failed, retrying: {}",
                raw.message_or_default()
            );

            let cancelled = match token {
                Some(token) => tokio::select! {
                    _ = sleep(delay) => false,
                    _ = token.cancelled() => true,
                },
                None => {
                    sleep(delay).await;
                    false
                }
            };

            if cancelled || token.is_some_and(CancellationToken::is_cancelled) {
                tracing::debug!(attempt, "Retry cancelled before next attempt");
                return Err(Stop::Cancelled(err));
            }

            attempt += 1;
        }
    }
}
