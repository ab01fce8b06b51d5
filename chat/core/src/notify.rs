//! Transient Notifications
//!
//! When an exchange fails, the timeline shows fallback text and a short-lived
//! notice is raised next to it (a toast, a status line, stderr in a console).
//! The controller hands failures to a [`Notifier`] and moves on: notifiers
//! are fire-and-forget and must never block.

use tokio::sync::mpsc;

use crate::messages::NotifyLevel;

/// A transient notice for the surface to display
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Severity
    pub level: NotifyLevel,
    /// Human-readable text
    pub message: String,
}

impl Notification {
    /// An error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Error,
            message: message.into(),
        }
    }

    /// A warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Warning,
            message: message.into(),
        }
    }
}

/// Sink for transient notifications
pub trait Notifier: Send + Sync {
    /// Show a notice. Must return promptly and never fail.
    fn notify(&self, notification: Notification);
}

/// Writes notices to the tracing log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotifyLevel::Info => tracing::info!(notice = %notification.message, "Notice"),
            NotifyLevel::Warning => tracing::warn!(notice = %notification.message, "Notice"),
            NotifyLevel::Error => tracing::warn!(error = %notification.message, "Request failed"),
        }
    }
}

/// Forwards notices to a channel drained by the surface
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the surface reads from
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped, notice discarded");
        }
    }
}
