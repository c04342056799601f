//! Progress Tracker
//!
//! Owns the task tree's runtime state, recomputes aggregate progress, and
//! emits progress events to subscribers.
//!
//! The tree is held as an arena: a flat map from task id to task record, with
//! parent/child relationships stored as id lists. Progress recomputation is a
//! pure bottom-up pass over ids, so there are no aliasing hazards from
//! recursive in-place mutation.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::models::{ProgressUpdate, Task, TaskStatus};

/// Progress floor applied the moment a task becomes in_progress.
const IN_PROGRESS_MIN_PROGRESS: u8 = 10;

/// Subscriber callback invoked for every emitted progress update.
pub type ProgressSubscriber = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Counts by status plus the root's overall progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// The registered root's progress, or 0 if no root is registered.
    pub overall_progress: u8,
}

/// One arena slot: the task record plus its tree links.
struct TaskNode {
    task: Task,
    children: Vec<String>,
    parent: Option<String>,
}

/// Tracks a task tree's runtime state and aggregates progress bottom-up.
#[derive(Default)]
pub struct ProgressTracker {
    nodes: HashMap<String, TaskNode>,
    root_id: Option<String>,
    subscribers: Vec<ProgressSubscriber>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the task and all of its descendants, recording the root id if
    /// `is_root`. Registering a task that is already indexed replaces its
    /// record.
    pub fn register_task(&mut self, task: &Task, is_root: bool) {
        self.index_subtree(task, None);
        if is_root {
            self.root_id = Some(task.id.clone());
        }
    }

    fn index_subtree(&mut self, task: &Task, parent: Option<String>) {
        let children: Vec<String> = task.subtasks.iter().map(|t| t.id.clone()).collect();

        let mut record = task.clone();
        // Children live in the arena, not inside the record.
        record.subtasks = Vec::new();

        self.nodes.insert(
            task.id.clone(),
            TaskNode {
                task: record,
                children,
                parent,
            },
        );

        for subtask in &task.subtasks {
            self.index_subtree(subtask, Some(task.id.clone()));
        }
    }

    /// Register a subscriber for progress events.
    pub fn subscribe(&mut self, subscriber: ProgressSubscriber) {
        self.subscribers.push(subscriber);
    }

    /// Update a single task's status.
    ///
    /// Sets `started_at` on the first transition to in_progress and
    /// `completed_at` on reaching a terminal status. Once a task has left
    /// pending its status never returns to pending (except via `reset`).
    /// Unknown task ids log a warning and are a no-op.
    pub fn update_status(&mut self, task_id: &str, status: TaskStatus, message: Option<&str>) {
        let Some(node) = self.nodes.get_mut(task_id) else {
            warn!("update_status: unknown task id '{}'", task_id);
            return;
        };

        if status == TaskStatus::Pending && node.task.status != TaskStatus::Pending {
            warn!(
                "update_status: ignoring pending transition for task '{}' in status {}",
                task_id, node.task.status
            );
            return;
        }

        node.task.status = status;
        match status {
            TaskStatus::InProgress => {
                if node.task.started_at.is_none() {
                    node.task.started_at = Some(Utc::now());
                }
                node.task.progress = node.task.progress.max(IN_PROGRESS_MIN_PROGRESS);
            }
            TaskStatus::Completed => {
                node.task.progress = 100;
                node.task.completed_at = Some(Utc::now());
            }
            TaskStatus::Failed | TaskStatus::Cancelled => {
                node.task.completed_at = Some(Utc::now());
            }
            TaskStatus::Pending => {}
        }

        self.recompute_ancestors(task_id);
        self.emit(task_id, message, None);
    }

    /// Update a single task's progress.
    ///
    /// Clamps to [0,100], floors to the in-progress minimum, auto-promotes
    /// pending tasks with progress to in_progress, and auto-completes at 100.
    /// Unknown task ids log a warning and are a no-op.
    pub fn update_progress(&mut self, task_id: &str, progress: u8, message: Option<&str>) {
        let Some(node) = self.nodes.get_mut(task_id) else {
            warn!("update_progress: unknown task id '{}'", task_id);
            return;
        };

        let mut progress = progress.min(100);

        if node.task.status == TaskStatus::Pending && progress > 0 {
            node.task.status = TaskStatus::InProgress;
            if node.task.started_at.is_none() {
                node.task.started_at = Some(Utc::now());
            }
        }

        if node.task.status == TaskStatus::InProgress {
            progress = progress.max(IN_PROGRESS_MIN_PROGRESS);
        }

        if progress >= 100 {
            progress = 100;
            if !node.task.status.is_terminal() {
                node.task.status = TaskStatus::Completed;
                node.task.completed_at = Some(Utc::now());
            }
        }

        node.task.progress = progress;

        self.recompute_ancestors(task_id);
        self.emit(task_id, message, None);
    }

    /// Attach a terminal result payload. Does not emit.
    pub fn set_result(&mut self, task_id: &str, result: serde_json::Value) {
        let Some(node) = self.nodes.get_mut(task_id) else {
            warn!("set_result: unknown task id '{}'", task_id);
            return;
        };
        node.task.result = Some(result);
    }

    /// Attach an error payload, force the status to failed, and emit once.
    pub fn set_error(&mut self, task_id: &str, error: impl Into<String>) {
        let Some(node) = self.nodes.get_mut(task_id) else {
            warn!("set_error: unknown task id '{}'", task_id);
            return;
        };

        let error = error.into();
        node.task.error = Some(error.clone());
        node.task.status = TaskStatus::Failed;
        node.task.completed_at = Some(Utc::now());

        self.recompute_ancestors(task_id);
        self.emit(task_id, Some(error.as_str()), None);
    }

    /// Snapshot of a single task with its subtree re-materialized.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        let node = self.nodes.get(task_id)?;
        let mut task = node.task.clone();
        task.subtasks = node
            .children
            .iter()
            .filter_map(|child_id| self.task(child_id))
            .collect();
        Some(task)
    }

    /// The registered root's id, if any.
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    /// Counts by status plus the root's overall progress.
    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: self.nodes.len(),
            ..Default::default()
        };

        for node in self.nodes.values() {
            match node.task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
            }
        }

        summary.overall_progress = self
            .root_id
            .as_ref()
            .and_then(|id| self.nodes.get(id))
            .map(|node| node.task.progress)
            .unwrap_or(0);

        summary
    }

    /// Wipe the whole tree and forget the root. Subscribers are kept.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root_id = None;
    }

    /// Recompute every ancestor's progress bottom-up as
    /// `round(average(children.progress))`, up to the registered root.
    fn recompute_ancestors(&mut self, task_id: &str) {
        let mut current = self
            .nodes
            .get(task_id)
            .and_then(|node| node.parent.clone());

        while let Some(parent_id) = current {
            let derived = {
                let Some(parent) = self.nodes.get(&parent_id) else {
                    break;
                };
                let children: Vec<u8> = parent
                    .children
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .map(|node| node.task.progress)
                    .collect();
                if children.is_empty() {
                    None
                } else {
                    let sum: u32 = children.iter().map(|&p| p as u32).sum();
                    Some((sum as f64 / children.len() as f64).round() as u8)
                }
            };

            let Some(parent) = self.nodes.get_mut(&parent_id) else {
                break;
            };
            if let Some(progress) = derived {
                parent.task.progress = progress;
            }
            current = parent.parent.clone();
        }
    }

    /// Emit a progress update to every subscriber. Each callback runs in
    /// isolation: a panicking subscriber is caught and logged, and the
    /// remaining subscribers still run.
    fn emit(&self, task_id: &str, message: Option<&str>, subtask_id: Option<&str>) {
        let Some(node) = self.nodes.get(task_id) else {
            return;
        };

        let update = ProgressUpdate {
            task_id: task_id.to_string(),
            status: node.task.status,
            progress: node.task.progress,
            message: message.map(|m| m.to_string()),
            subtask_id: subtask_id.map(|s| s.to_string()),
        };

        for subscriber in &self.subscribers {
            let subscriber = subscriber.clone();
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| subscriber(&update))) {
                warn!("progress subscriber panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tree_with_two_children() -> (Task, String, String, String) {
        let mut root = Task::with_id("root", "root task");
        root.subtasks.push(Task::with_id("a", "first child"));
        root.subtasks.push(Task::with_id("b", "second child"));
        (
            root,
            "root".to_string(),
            "a".to_string(),
            "b".to_string(),
        )
    }

    #[test]
    fn test_register_indexes_all_descendants() {
        let (root, ..) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        assert_eq!(tracker.summary().total, 3);
        assert_eq!(tracker.root_id(), Some("root"));
        assert!(tracker.task("a").is_some());
    }

    #[test]
    fn test_parent_progress_is_rounded_average() {
        let (root, ..) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_progress("a", 40, None);
        tracker.update_progress("b", 60, None);

        assert_eq!(tracker.task("root").unwrap().progress, 50);
    }

    #[test]
    fn test_deep_tree_recomputes_to_root() {
        let mut root = Task::with_id("root", "root");
        let mut mid = Task::with_id("mid", "middle");
        mid.subtasks.push(Task::with_id("leaf", "leaf"));
        root.subtasks.push(mid);

        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_progress("leaf", 80, None);
        assert_eq!(tracker.task("mid").unwrap().progress, 80);
        assert_eq!(tracker.task("root").unwrap().progress, 80);
    }

    #[test]
    fn test_in_progress_floors_progress_to_ten() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_status(&a, TaskStatus::InProgress, None);
        let task = tracker.task(&a).unwrap();
        assert_eq!(task.progress, 10);
        assert!(task.started_at.is_some());

        // A later smaller update is floored too.
        tracker.update_progress(&a, 3, None);
        assert_eq!(tracker.task(&a).unwrap().progress, 10);
    }

    #[test]
    fn test_progress_auto_promotes_pending() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_progress(&a, 30, None);
        let task = tracker.task(&a).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, 30);
    }

    #[test]
    fn test_progress_hundred_completes() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_progress(&a, 100, None);
        let task = tracker.task(&a).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_progress_clamps_above_hundred() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_progress(&a, 250, None);
        assert_eq!(tracker.task(&a).unwrap().progress, 100);
    }

    #[test]
    fn test_status_never_returns_to_pending() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_status(&a, TaskStatus::InProgress, None);
        tracker.update_status(&a, TaskStatus::Pending, None);
        assert_eq!(tracker.task(&a).unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn test_completed_forces_full_progress() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_status(&a, TaskStatus::Completed, None);
        let task = tracker.task(&a).unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_unknown_task_is_noop() {
        let mut tracker = ProgressTracker::new();
        // Must not panic or emit.
        tracker.update_status("ghost", TaskStatus::Completed, None);
        tracker.update_progress("ghost", 50, None);
        tracker.set_error("ghost", "nope");
        assert_eq!(tracker.summary().total, 0);
    }

    #[test]
    fn test_set_error_forces_failed_and_emits_once() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        tracker.subscribe(Arc::new(move |update| {
            sink.lock().unwrap().push(update.clone());
        }));

        tracker.set_error(&a, "disk full");

        let task = tracker.task(&a).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("disk full"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, TaskStatus::Failed);
        assert_eq!(events[0].message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_set_result_does_not_emit() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        let count = Arc::new(Mutex::new(0usize));
        let sink = count.clone();
        tracker.subscribe(Arc::new(move |_| {
            *sink.lock().unwrap() += 1;
        }));

        tracker.set_result(&a, serde_json::json!({"ok": true}));
        assert_eq!(*count.lock().unwrap(), 0);
        assert!(tracker.task(&a).unwrap().result.is_some());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let (root, _, a, _) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        let reached = Arc::new(Mutex::new(false));
        tracker.subscribe(Arc::new(|_| panic!("bad subscriber")));
        let sink = reached.clone();
        tracker.subscribe(Arc::new(move |_| {
            *sink.lock().unwrap() = true;
        }));

        tracker.update_progress(&a, 50, None);
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn test_summary_counts() {
        let (root, _, a, b) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.update_status(&a, TaskStatus::Completed, None);
        tracker.update_status(&b, TaskStatus::InProgress, None);

        let summary = tracker.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.pending, 1);
        // (100 + 10) / 2 = 55
        assert_eq!(summary.overall_progress, 55);
    }

    #[test]
    fn test_reset_wipes_tree() {
        let (root, ..) = tree_with_two_children();
        let mut tracker = ProgressTracker::new();
        tracker.register_task(&root, true);

        tracker.reset();
        assert_eq!(tracker.summary().total, 0);
        assert!(tracker.root_id().is_none());
        assert!(tracker.task("root").is_none());
    }
}
