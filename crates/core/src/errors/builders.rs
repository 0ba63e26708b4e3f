//! Builder methods for creating errors with context

use super::types::Error;
use std::time::Duration;

impl Error {
    /// Create a transport error
    #[must_use]
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an HTTP status error; 404 maps to `NotFound`
    #[must_use]
    pub fn http(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if status == 404 {
            return Error::NotFound { endpoint };
        }
        Error::Http {
            endpoint,
            status,
            message: message.into(),
        }
    }

    /// Create a factory error
    #[must_use]
    pub fn factory(
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Factory {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Create a precondition error
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
