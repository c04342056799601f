//! Task Models
//!
//! The hierarchical unit-of-work tree and its progress events. Tasks are
//! created by the task planner, mutated only through the progress tracker,
//! and never deleted — a tracker reset wipes the whole tree.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution status of a task or plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Complexity classification used for planning and weighted progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Weight used by complexity-weighted progress aggregation.
    pub fn weight(&self) -> u32 {
        match self {
            Complexity::Low => 1,
            Complexity::Medium => 2,
            Complexity::High => 3,
        }
    }
}

impl Default for Complexity {
    fn default() -> Self {
        Self::Medium
    }
}

/// Planner-supplied metadata attached to a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    /// Complexity class assigned by the planner
    #[serde(default)]
    pub complexity: Complexity,
    /// Tool names the planner expects this task to need
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Declared dependencies on sibling plan items. Recorded for reporting;
    /// execution currently follows plan order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Additional free-form metadata
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A node in the hierarchical task tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier
    pub id: String,
    /// What this task should accomplish
    pub description: String,
    /// Current status
    pub status: TaskStatus,
    /// Child tasks, owned exclusively by this parent
    #[serde(default)]
    pub subtasks: Vec<Task>,
    /// Progress 0-100. Derived from children for parent tasks; set directly
    /// by execution for leaves.
    pub progress: u8,
    /// Terminal output payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on the first transition to in_progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set on reaching a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Planner metadata
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl Task {
    /// Create a new pending task with a generated id.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            status: TaskStatus::Pending,
            subtasks: Vec::new(),
            progress: 0,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            metadata: TaskMetadata::default(),
        }
    }

    /// Create a new pending task with a specific id.
    pub fn with_id(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(description)
        }
    }

    /// Whether this task has no subtasks.
    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Count this task plus all descendants.
    pub fn node_count(&self) -> usize {
        1 + self
            .subtasks
            .iter()
            .map(|t| t.node_count())
            .sum::<usize>()
    }
}

/// Progress event emitted to subscribers. Never retained by the tracker
/// beyond the current value on the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Task the update refers to
    pub task_id: String,
    /// Status after the update
    pub status: TaskStatus,
    /// Progress 0-100 after the update
    pub progress: u8,
    /// Optional human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set when the update was caused by a child of the reported task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
}
