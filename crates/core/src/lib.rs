//! Core domain types, errors, and collaborator seams for `forcedash`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate in
//!   the workspace (transport, HTTP, not-found, factory and precondition failures).
//! - **`types`**: validated identifiers (`TaskId`, `ChartName`) and the task
//!   status model returned by the analysis backend.
//! - **`notify`**: the notification and navigation collaborators the
//!   orchestration layer talks to instead of a UI framework.
//! - **`observable`**: a small observable state cell used to expose poller
//!   and loader state to any front end.

pub mod errors;
pub mod notify;
pub mod observable;
pub mod types;

pub use self::{
    errors::{Error, Result},
    notify::{
        Navigator, Notification, NotificationKind, NotificationLog, Notifier, NotifyOptions,
        TracingNotifier,
    },
    observable::Observable,
    types::*,
};
