//! Shared utilities for forcedash
//!
//! Retry and backoff policies for network calls, and the tracing subscriber
//! setup used by the binary.

pub mod network;
pub mod tracing;

pub use network::retry::{retry_async, BackoffPolicy, BackoffStrategy, RetryableError};
