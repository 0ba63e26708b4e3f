//! Keyspace facades over [`SharedCache`](crate::SharedCache)
//!
//! - **`task`**: `<kind>:<taskId>:<name>` keys for per-task resources such as
//!   chart images
//! - **`results`**: `results:<taskId>` and `ai:<taskId>` JSON documents

pub mod results;
pub mod task;

pub use results::ResultsCache;
pub use task::{task_scoped_key, TaskScopedCache};
