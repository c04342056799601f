//! Orchestrator task-tree execution.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentflow::llm::types::ToolCallReliability;
use agentflow::models::TaskStatus;
use agentflow::{Orchestrator, OrchestratorConfig, ProgressUpdate};

use crate::support::{text_response, MockProvider};

const PLAN: &str = r#"```json
{"steps": [
    {"description": "collect input files", "complexity": "low", "toolsNeeded": ["Read"]},
    {"description": "produce the summary", "complexity": "medium", "toolsNeeded": []}
]}
```"#;

fn orchestrator(provider: Arc<MockProvider>) -> Orchestrator {
    Orchestrator::with_provider(OrchestratorConfig::default(), provider)
}

#[tokio::test]
async fn task_tree_executes_sequentially_and_aggregates() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("done"));
    provider.push(Ok(text_response(PLAN)));
    provider.push(Ok(text_response("files collected")));
    provider.push(Ok(text_response("summary produced")));

    let orchestrator = orchestrator(provider);

    let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    orchestrator.subscribe_progress(Arc::new(move |update| {
        sink.lock().unwrap().push(update.clone());
    }));

    let result = orchestrator.execute_task("summarize the input").await.unwrap();
    assert!(result.success);
    assert!(result.output.contains("files collected"));
    assert!(result.output.contains("summary produced"));

    let root = orchestrator.task(&result.root_task_id.unwrap()).unwrap();
    assert_eq!(root.subtasks.len(), 2);
    assert_eq!(root.progress, 100);
    assert!(root.subtasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert!(root.subtasks.iter().all(|t| t.result.is_some()));

    // The metadata recorded the planner's annotations.
    assert_eq!(root.subtasks[0].metadata.required_tools, vec!["Read"]);

    // Events flowed for both subtasks.
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| e.status == TaskStatus::InProgress));
    assert!(events.iter().any(|e| e.status == TaskStatus::Completed));
}

#[tokio::test]
async fn second_execute_call_conflicts_while_first_runs() {
    // A provider slow enough that the second call lands mid-run.
    let provider = MockProvider::with_delay(
        ToolCallReliability::Reliable,
        text_response("done"),
        Duration::from_millis(30),
    );
    provider.push(Ok(text_response(PLAN)));
    let orchestrator = Arc::new(orchestrator(provider));

    let background = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.execute_task("long running request").await })
    };

    // Let the first run take the running flag.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(orchestrator.is_running());

    let second = orchestrator.execute_task("second request").await.unwrap();
    assert!(!second.success);
    assert!(second.error.unwrap().contains("already running"));
    assert!(second.root_task_id.is_none());

    let first = background.await.unwrap().unwrap();
    assert!(first.success);

    // The conflicting call left no trace in the session.
    assert_eq!(orchestrator.session().root_task_ids.len(), 1);
}

#[tokio::test]
async fn session_reflects_config_and_completed_runs() {
    let workdir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("done"));
    provider.push(Ok(text_response("no json, single subtask")));

    let config = OrchestratorConfig {
        working_directory: workdir.path().display().to_string(),
        ..Default::default()
    };
    let orchestrator = Orchestrator::with_provider(config, provider);

    let before = orchestrator.session();
    assert_eq!(before.working_directory, workdir.path().display().to_string());
    assert!(before.root_task_ids.is_empty());

    orchestrator.add_context_file("notes/outline.md");
    orchestrator.execute_task("one thing").await.unwrap();

    let after = orchestrator.session();
    assert_eq!(after.root_task_ids.len(), 1);
    assert_eq!(after.context_files, vec!["notes/outline.md"]);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn unparseable_plan_degrades_to_single_subtask() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("answered"));
    provider.push(Ok(text_response("Let me just do that for you.")));

    let orchestrator = orchestrator(provider);
    let result = orchestrator.execute_task("tiny request").await.unwrap();
    assert!(result.success);

    let root = orchestrator.task(&result.root_task_id.unwrap()).unwrap();
    assert_eq!(root.subtasks.len(), 1);
    assert_eq!(root.subtasks[0].description, "tiny request");
}

#[tokio::test]
async fn provider_failure_mid_tree_fails_root_and_stops() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("unreached"));
    provider.push(Ok(text_response(PLAN)));
    provider.push(Ok(text_response("first ok")));
    provider.push(Err(agentflow::llm::LlmError::ServerError {
        message: "mid-run outage".to_string(),
        status: Some(503),
    }));

    let orchestrator = orchestrator(provider);
    let result = orchestrator.execute_task("doomed request").await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("mid-run outage"));

    let root = orchestrator.task(&result.root_task_id.unwrap()).unwrap();
    assert_eq!(root.status, TaskStatus::Failed);
    assert_eq!(root.subtasks[0].status, TaskStatus::Completed);
    assert_eq!(root.subtasks[1].status, TaskStatus::Failed);
    assert!(!orchestrator.is_running());
}
