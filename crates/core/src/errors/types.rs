//! Core error type definitions

use std::time::Duration;

/// Result type alias for forcedash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for forcedash operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (connection refused, reset, DNS)
    Transport { endpoint: String, message: String },

    /// The request was cancelled because its deadline elapsed
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The server answered with a non-success status
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The addressed resource does not exist (HTTP 404)
    NotFound { endpoint: String },

    /// A cache value producer failed
    Factory {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A task identifier failed validation
    InvalidTaskId { value: String, reason: String },

    /// An operation was invoked without what it needs to run
    Precondition { message: String },

    /// Configuration errors
    Configuration { message: String },

    /// JSON serialization/deserialization errors
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether the failure happened below HTTP (no response was received)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Timeout { .. })
    }
}
