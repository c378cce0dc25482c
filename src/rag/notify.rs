//! Fire-and-forget user notifications (progress and round errors).

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Progress,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);

    fn notify_error(&self, message: &str) {
        self.notify(message);
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(target: "notify", "{}", message);
    }

    fn notify_error(&self, message: &str) {
        tracing::error!(target: "notify", "{}", message);
    }
}

#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}

/// Forwards notifications into an mpsc channel. Send failures (receiver
/// gone) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, kind: NotificationKind, message: &str) {
        let _ = self.tx.send(Notification {
            kind,
            message: message.to_string(),
        });
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        self.send(NotificationKind::Progress, message);
    }

    fn notify_error(&self, message: &str) {
        self.send(NotificationKind::Error, message);
    }
}
