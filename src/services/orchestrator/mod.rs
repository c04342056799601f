//! Orchestrator
//!
//! Composition root: owns the session, the tool/skill registries, the task
//! planner and progress tracker, and the active provider. Requests either
//! run through the classic task-tree path (`execute_task`) or enter the
//! clarification-driven plan-mode workflow (`start_plan_mode`).
//!
//! Registries are instance state; multiple orchestrators can coexist in one
//! process without cross-talk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agentflow_llm::types::ProviderConfig;
use agentflow_llm::{create_provider, LlmProvider};
use agentflow_tools::{Tool, ToolRegistry};

use crate::models::{Session, Task, TaskStatus};
use crate::services::agent::AgentRunner;
use crate::services::plan_mode::PlanModeWorkflow;
use crate::services::planner::TaskPlanner;
use crate::services::progress::{ProgressSubscriber, ProgressSummary, ProgressTracker};
use crate::services::skills::{Skill, SkillRegistry};
use crate::utils::error::{AppError, AppResult};

/// Orchestrator construction parameters.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Working directory tasks execute against
    pub working_directory: String,
    /// Active provider configuration
    pub provider: ProviderConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            working_directory: ".".to_string(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Result of one `execute_task` run.
#[derive(Debug, Clone)]
pub struct TaskRunResult {
    pub success: bool,
    /// Root task id, when a tree was created
    pub root_task_id: Option<String>,
    /// Concatenated subtask outputs
    pub output: String,
    pub error: Option<String>,
}

impl TaskRunResult {
    fn failure(error: impl Into<String>, root_task_id: Option<String>) -> Self {
        Self {
            success: false,
            root_task_id,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Clears the running flag when a task run leaves scope.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One orchestrator serves one session.
pub struct Orchestrator {
    session: Mutex<Session>,
    provider: Arc<dyn LlmProvider>,
    tools: Mutex<ToolRegistry>,
    skills: Mutex<SkillRegistry>,
    planner: Mutex<TaskPlanner>,
    tracker: Arc<Mutex<ProgressTracker>>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl Orchestrator {
    /// Create an orchestrator, constructing the provider from the config.
    pub fn new(config: OrchestratorConfig) -> Self {
        let provider = create_provider(config.provider.clone());
        Self::with_provider(config, provider)
    }

    /// Create an orchestrator over an already-constructed provider.
    pub fn with_provider(config: OrchestratorConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            session: Mutex::new(Session::new(
                config.working_directory,
                config.provider,
            )),
            provider,
            tools: Mutex::new(ToolRegistry::new()),
            skills: Mutex::new(SkillRegistry::new()),
            planner: Mutex::new(TaskPlanner::new()),
            tracker: Arc::new(Mutex::new(ProgressTracker::new())),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Register a tool with this orchestrator's registry.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        self.tools.lock().unwrap().register(tool);
    }

    /// Register a skill with this orchestrator's registry.
    pub fn register_skill(&self, skill: Skill) {
        self.skills.lock().unwrap().register(skill);
    }

    /// Record a context file reference on the session; referenced files are
    /// named in subsequent planning prompts.
    pub fn add_context_file(&self, path: impl Into<String>) {
        let mut session = self.session.lock().unwrap();
        session.context_files.push(path.into());
        session.touch();
    }

    /// Subscribe to progress events from the task tree.
    pub fn subscribe_progress(&self, subscriber: ProgressSubscriber) {
        self.tracker.lock().unwrap().subscribe(subscriber);
    }

    /// Snapshot of the session.
    pub fn session(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    /// Counts by status plus the root's overall progress.
    pub fn summary(&self) -> ProgressSummary {
        self.tracker.lock().unwrap().summary()
    }

    /// Snapshot of a task and its subtree.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.tracker.lock().unwrap().task(task_id)
    }

    /// Whether a task execution is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Enter the clarification-driven plan-mode workflow.
    pub fn start_plan_mode(&self) -> PlanModeWorkflow {
        PlanModeWorkflow::new(self.provider.clone())
    }

    /// Cooperative cancellation: flips the running flag and marks the root
    /// task cancelled. An in-flight provider or tool call completes on its
    /// own schedule and its result is discarded.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
        self.running.store(false, Ordering::SeqCst);

        let mut tracker = self.tracker.lock().unwrap();
        if let Some(root_id) = tracker.root_id().map(|s| s.to_string()) {
            tracker.update_status(&root_id, TaskStatus::Cancelled, Some("cancelled"));
        }
    }

    /// Classic task-tree execution: decompose the request into a tree, then
    /// execute the subtasks strictly sequentially, recording every status
    /// and progress change in the tracker.
    ///
    /// At most one execution may be in flight; a second call fails fast
    /// with a concurrency-conflict result and makes no state changes.
    pub async fn execute_task(&self, request: &str) -> AppResult<TaskRunResult> {
        if !self.provider.is_configured() {
            return Err(AppError::configuration(format!(
                "provider '{}' is not configured",
                self.provider.name()
            )));
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("execute_task rejected: another execution is in flight");
            return Ok(TaskRunResult::failure(
                "Another task execution is already running",
                None,
            ));
        }
        let _guard = RunningGuard(&self.running);

        let cancel = {
            let mut slot = self.cancel.lock().unwrap();
            *slot = CancellationToken::new();
            slot.clone()
        };

        // Plan the request into a flat tree. Parsing degrades to a
        // single-subtask plan, so this phase never fails the run.
        let planning_prompt = {
            let mut planner = self.planner.lock().unwrap();
            planner.set_tool_catalogue(self.tools.lock().unwrap().catalogue());
            let skills_section = self.skills.lock().unwrap().prompt_section();
            let mut prompt = planner.planning_prompt();
            if !skills_section.is_empty() {
                prompt = format!("{}\n\n{}", skills_section, prompt);
            }
            let context_files = self.session.lock().unwrap().context_files.clone();
            if !context_files.is_empty() {
                prompt.push_str("\n\n## Context Files\n");
                for path in &context_files {
                    prompt.push_str(&format!("- {}\n", path));
                }
            }
            format!("{}\n\n## Request\n{}", prompt, request)
        };

        let plan_text = match self.provider.complete(&planning_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("planning call failed ({}); using single-task fallback", e);
                String::new()
            }
        };

        let tree = {
            let planner = self.planner.lock().unwrap();
            let items = planner.parse_plan_response(request, &plan_text);
            planner.create_task_tree(request, &items)
        };
        let root_id = tree.id.clone();
        let subtasks: Vec<(String, String)> = tree
            .subtasks
            .iter()
            .map(|t| (t.id.clone(), t.description.clone()))
            .collect();

        self.tracker.lock().unwrap().register_task(&tree, true);
        self.session.lock().unwrap().record_root_task(&root_id);
        info!(
            "executing task tree '{}' with {} subtasks",
            root_id,
            subtasks.len()
        );

        let runner = AgentRunner::new(self.provider.clone());
        let tools_snapshot = self.tools.lock().unwrap().clone();
        let mut outputs: Vec<String> = Vec::new();

        self.tracker
            .lock()
            .unwrap()
            .update_status(&root_id, TaskStatus::InProgress, Some("started"));

        for (subtask_id, description) in &subtasks {
            if cancel.is_cancelled() {
                return Ok(TaskRunResult::failure(
                    "Task execution cancelled",
                    Some(root_id),
                ));
            }

            self.tracker.lock().unwrap().update_status(
                subtask_id,
                TaskStatus::InProgress,
                None,
            );

            let tracker = self.tracker.clone();
            let progress_task_id = subtask_id.clone();
            let on_progress = move |progress: u8, message: &str| {
                tracker.lock().unwrap().update_progress(
                    &progress_task_id,
                    progress,
                    Some(message),
                );
            };

            let outcome = runner
                .execute_directly(description, &tools_snapshot, &on_progress)
                .await;

            if cancel.is_cancelled() {
                // The in-flight call finished after cancellation; its result
                // is superseded by the cancelled status.
                return Ok(TaskRunResult::failure(
                    "Task execution cancelled",
                    Some(root_id),
                ));
            }

            if outcome.success {
                let mut tracker = self.tracker.lock().unwrap();
                tracker.set_result(subtask_id, serde_json::json!(outcome.output.clone()));
                tracker.update_status(subtask_id, TaskStatus::Completed, None);
                outputs.push(outcome.output);
            } else {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "Subtask execution failed".to_string());
                let mut tracker = self.tracker.lock().unwrap();
                tracker.set_error(subtask_id, error.clone());
                tracker.set_error(&root_id, format!("Subtask failed: {}", error));
                return Ok(TaskRunResult::failure(error, Some(root_id)));
            }
        }

        self.session.lock().unwrap().touch();

        Ok(TaskRunResult {
            success: true,
            root_task_id: Some(root_id),
            output: outputs.join("\n\n"),
            error: None,
        })
    }
}
