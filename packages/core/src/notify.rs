//! Notification dispatch.
//!
//! The subsystem never renders anything itself. It hands user-facing
//! messages to a [`Notifier`] owned by the UI layer, fire-and-forget.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

/// Toast/notification service consumed by the subsystem.
pub trait Notifier: Send + Sync {
    fn show(
        &self,
        kind: NotificationKind,
        title: &str,
        message: Option<&str>,
        duration: Option<Duration>,
    );
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(
        &self,
        kind: NotificationKind,
        title: &str,
        message: Option<&str>,
        _duration: Option<Duration>,
    ) {
        let message = message.unwrap_or("");
        match kind {
            NotificationKind::Error => tracing::error!(title, body = message, "notification"),
            NotificationKind::Warning => tracing::warn!(title, body = message, "notification"),
            NotificationKind::Success | NotificationKind::Info => {
                tracing::info!(title, body = message, "notification")
            }
        }
    }
}

/// A notification as delivered to a UI task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

/// Forwards notifications over an unbounded channel to whoever renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn show(
        &self,
        kind: NotificationKind,
        title: &str,
        message: Option<&str>,
        duration: Option<Duration>,
    ) {
        let notification = Notification {
            kind,
            title: title.to_string(),
            message: message.map(str::to_string),
            duration,
        };
        // Receiver gone means the UI shut down; nothing left to notify.
        if self.sender.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped; discarding '{}'", title);
        }
    }
}
