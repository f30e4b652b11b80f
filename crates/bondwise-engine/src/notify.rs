//! Fan-out notification publisher.
//!
//! The UI collaborator subscribes here for toast-style messages. The
//! engine never blocks on a slow subscriber: broadcast semantics drop
//! the oldest unread messages for laggards.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Something to look at, nothing failed.
    Warning,
    /// Operation failed.
    Error,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity for display.
    pub severity: Severity,
    /// Human-readable classification.
    pub description: String,
    /// Raw provider-supplied reason, preserved for diagnostics.
    pub detailed: Option<String>,
}

impl Notification {
    /// Build a notification without diagnostics detail.
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
            detailed: None,
        }
    }

    /// Attach the raw reason.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detailed = Some(detail.into());
        self
    }
}

/// Broadcast publisher of notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier {
    /// Create a notifier with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish a notification. A send with no subscribers is not an
    /// error.
    pub fn publish(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }

    /// Shorthand publishers used throughout the engine.
    pub fn info(&self, description: impl Into<String>) {
        self.publish(Notification::new(Severity::Info, description));
    }

    /// Publish a success message.
    pub fn success(&self, description: impl Into<String>) {
        self.publish(Notification::new(Severity::Success, description));
    }

    /// Publish a warning.
    pub fn warning(&self, description: impl Into<String>) {
        self.publish(Notification::new(Severity::Warning, description));
    }

    /// Publish an error with its raw reason.
    pub fn error(&self, description: impl Into<String>, detail: Option<String>) {
        let mut n = Notification::new(Severity::Error, description);
        n.detailed = detail;
        self.publish(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.success("transaction sent");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.severity, Severity::Success);
        assert_eq!(received.description, "transaction sent");
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let notifier = Notifier::default();
        notifier.warning("nobody listening");
    }
}
