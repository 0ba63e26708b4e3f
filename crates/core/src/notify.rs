//! Notification and navigation collaborators
//!
//! The orchestration layer never renders anything itself. It reports outcomes
//! through a [`Notifier`] and asks a [`Navigator`] to switch views, and a front
//! end (terminal, desktop, web bridge) supplies the implementations.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Success => "success",
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOptions {
    /// Persistent notifications stay until the user dismisses them
    pub persistent: bool,
}

impl NotifyOptions {
    pub fn persistent() -> Self {
        Self { persistent: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub options: NotifyOptions,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            options: NotifyOptions::default(),
            created_at: Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.options.persistent = true;
        self
    }
}

/// Receives user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Switches the consuming context to another view
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str);
}

/// Notifier that writes every notification to the tracing pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Error => {
                tracing::error!(persistent = n.options.persistent, "{}: {}", n.title, n.message)
            }
            NotificationKind::Warning => {
                tracing::warn!(persistent = n.options.persistent, "{}: {}", n.title, n.message)
            }
            _ => tracing::info!(kind = %n.kind, "{}: {}", n.title, n.message),
        }
    }
}

impl Navigator for TracingNotifier {
    fn navigate_to(&self, path: &str) {
        tracing::info!(path, "navigation requested");
    }
}

/// In-memory notifier/navigator that keeps everything it receives.
///
/// Used by front ends that render a notification history, and by tests.
#[derive(Debug, Default)]
pub struct NotificationLog {
    notifications: Mutex<Vec<Notification>>,
    navigations: Mutex<Vec<String>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn clear(&self) {
        self.notifications.lock().clear();
        self.navigations.lock().clear();
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

impl Navigator for NotificationLog {
    fn navigate_to(&self, path: &str) {
        self.navigations.lock().push(path.to_string());
    }
}
