//! User-facing notification sink.
//!
//! The update coordinator reports saves, failed saves and invalid records
//! here. Lock rejections and safety timeouts are never reported.
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotifyKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotifyKind, msg: &config::Message) -> Self {
        Self {
            kind,
            title: msg.title.clone(),
            message: msg.message.clone(),
        }
    }
}

/// fire-and-forget, must not block
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync + 'static,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotifyKind::Success => info!(title = %n.title, message = %n.message, "notification"),
            NotifyKind::Error => warn!(title = %n.title, message = %n.message, "notification"),
        }
    }
}

/// forwards notifications over an unbounded channel, dropped if the receiver is gone
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("notification receiver dropped");
        }
    }
}
