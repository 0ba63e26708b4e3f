//! Task status model returned by `GET /api/task/{taskId}`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-reported status of an analysis task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Any status string this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Completed and Failed end a polling session
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a task's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskSnapshot {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            progress: 0.0,
            error: None,
            message: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// The status endpoint answers either with a bare snapshot or wrapped in
/// `{ "success": .., "message": .., "task": { .. } }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskStatusEnvelope {
    Wrapped { task: TaskSnapshot },
    Bare(TaskSnapshot),
}

impl TaskStatusEnvelope {
    pub fn into_snapshot(self) -> TaskSnapshot {
        match self {
            TaskStatusEnvelope::Wrapped { task } => task,
            TaskStatusEnvelope::Bare(task) => task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bare_snapshot() {
        let raw = r#"{"status":"running","progress":42}"#;
        let snapshot: TaskStatusEnvelope = serde_json::from_str(raw).unwrap();
        let snapshot = snapshot.into_snapshot();
        assert_eq!(snapshot.status, TaskStatus::Running);
        assert_eq!(snapshot.progress, 42.0);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_parses_wrapped_snapshot() {
        let raw = r#"{"success":true,"message":"ok","task":{"task_id":"t1","status":"failed","progress":10,"error":"R script crashed"}}"#;
        let snapshot: TaskStatusEnvelope = serde_json::from_str(raw).unwrap();
        let snapshot = snapshot.into_snapshot();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("R script crashed"));
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let snapshot: TaskSnapshot = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Unknown);
        assert!(!snapshot.status.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}
