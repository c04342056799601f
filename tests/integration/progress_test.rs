//! Progress aggregation invariants.

use std::sync::{Arc, Mutex};

use agentflow::{ProgressTracker, ProgressUpdate, Task, TaskStatus};

fn register_tree(children: &[(&str, u8)]) -> (ProgressTracker, String) {
    let mut root = Task::with_id("root", "root task");
    for (id, progress) in children {
        let mut child = Task::with_id(*id, format!("child {}", id));
        child.progress = *progress;
        root.subtasks.push(child);
    }

    let mut tracker = ProgressTracker::new();
    tracker.register_task(&root, true);
    (tracker, "root".to_string())
}

#[test]
fn root_progress_is_rounded_average_of_children() {
    // Two children at 40 and 60: updating either child puts the root at 50.
    let (mut tracker, root) = register_tree(&[("a", 40), ("b", 60)]);

    tracker.update_progress("a", 40, None);
    assert_eq!(tracker.task(&root).unwrap().progress, 50);

    tracker.update_progress("b", 60, None);
    assert_eq!(tracker.task(&root).unwrap().progress, 50);
}

#[test]
fn aggregation_holds_for_every_leaf_update() {
    let (mut tracker, root) = register_tree(&[("a", 0), ("b", 0), ("c", 0)]);

    let updates = [("a", 30u8), ("b", 45), ("c", 80), ("a", 90), ("b", 100)];
    for (id, progress) in updates {
        tracker.update_progress(id, progress, None);

        let snapshot = tracker.task(&root).unwrap();
        let sum: u32 = snapshot.subtasks.iter().map(|t| t.progress as u32).sum();
        let expected = (sum as f64 / snapshot.subtasks.len() as f64).round() as u8;
        assert_eq!(
            snapshot.progress, expected,
            "root must equal round(average(children)) after updating {}",
            id
        );
    }
}

#[test]
fn aggregation_recomputes_through_intermediate_levels() {
    let mut leaf_a = Task::with_id("leaf-a", "leaf a");
    leaf_a.progress = 0;
    let mut leaf_b = Task::with_id("leaf-b", "leaf b");
    leaf_b.progress = 0;

    let mut mid = Task::with_id("mid", "middle");
    mid.subtasks.push(leaf_a);
    mid.subtasks.push(leaf_b);

    let mut root = Task::with_id("root", "root");
    root.subtasks.push(mid);
    root.subtasks.push(Task::with_id("side", "side leaf"));

    let mut tracker = ProgressTracker::new();
    tracker.register_task(&root, true);

    tracker.update_progress("leaf-a", 100, None);
    // mid = round((100 + 0) / 2) = 50; root = round((50 + 0) / 2) = 25
    assert_eq!(tracker.task("mid").unwrap().progress, 50);
    assert_eq!(tracker.task("root").unwrap().progress, 25);
}

#[test]
fn status_monotonicity_once_left_pending() {
    let (mut tracker, _) = register_tree(&[("a", 0)]);

    tracker.update_status("a", TaskStatus::InProgress, None);
    tracker.update_status("a", TaskStatus::Pending, None);
    assert_eq!(tracker.task("a").unwrap().status, TaskStatus::InProgress);

    // Only a full reset brings tasks back to a clean slate.
    tracker.reset();
    assert!(tracker.task("a").is_none());
}

#[test]
fn subscribers_receive_every_update() {
    let (mut tracker, _) = register_tree(&[("a", 0), ("b", 0)]);

    let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    tracker.subscribe(Arc::new(move |update| {
        sink.lock().unwrap().push(update.clone());
    }));

    tracker.update_progress("a", 50, Some("halfway"));
    tracker.update_status("b", TaskStatus::InProgress, None);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, "a");
    assert_eq!(events[0].progress, 50);
    assert_eq!(events[0].message.as_deref(), Some("halfway"));
    assert_eq!(events[1].task_id, "b");
    assert_eq!(events[1].status, TaskStatus::InProgress);
}
