//! Domain types shared across the workspace

pub mod newtypes;
pub mod task;

pub use newtypes::{ChartName, TaskId};
pub use task::{TaskSnapshot, TaskStatus, TaskStatusEnvelope};
