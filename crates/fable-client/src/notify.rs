//! User-facing notifications.
//!
//! Presentation is someone else's job; flows only say what happened.

use std::sync::Arc;

use parking_lot::Mutex;

/// Sink for user-facing success and error messages.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Shared notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Notifier that writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(notification = "success", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::warn!(notification = "error", "{}", message);
    }
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

/// Notifier that keeps everything in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Success(m) => Some(m.clone()),
                Notification::Error(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Error(m) => Some(m.clone()),
                Notification::Success(_) => None,
            })
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn success(&self, message: &str) {
        self.events
            .lock()
            .push(Notification::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.events
            .lock()
            .push(Notification::Error(message.to_string()));
    }
}
