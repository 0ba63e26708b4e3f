//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport { endpoint, message } => {
                write!(f, "request to '{endpoint}' failed: {message}")
            }
            Error::Timeout {
                operation,
                duration,
            } => {
                write!(f, "operation '{operation}' timed out after {duration:?}")
            }
            Error::Http {
                endpoint,
                status,
                message,
            } => {
                if message.is_empty() {
                    write!(f, "request to '{endpoint}' failed with status {status}")
                } else {
                    write!(
                        f,
                        "request to '{endpoint}' failed with status {status}: {message}"
                    )
                }
            }
            Error::NotFound { endpoint } => write!(f, "resource '{endpoint}' not found"),
            Error::Factory { key, source } => {
                write!(f, "failed to produce value for cache key '{key}': {source}")
            }
            Error::InvalidTaskId { value, reason } => {
                write!(f, "invalid task id '{value}': {reason}")
            }
            Error::Precondition { message } => write!(f, "precondition failed: {message}"),
            Error::Configuration { message } => write!(f, "configuration error: {message}"),
            Error::Json { message, .. } => write!(f, "JSON error: {message}"),
        }
    }
}
