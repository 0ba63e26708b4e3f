//! Network-related utilities.
//!
//! - **`retry`**: backoff policies and a retry loop for transient failures.

pub mod retry;
