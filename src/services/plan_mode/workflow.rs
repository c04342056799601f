//! Plan-Mode Workflow
//!
//! The clarification-driven entry point layered on a provider: the provider
//! embeds clarification/plan/progress/artifact events in its text output,
//! and this workflow parses them, advances its phase machine, and notifies
//! registered callbacks. Execution is strictly sequential, one step at a
//! time.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use agentflow_llm::types::Message;
use agentflow_llm::LlmProvider;

use crate::models::{Artifact, TaskStatus};
use crate::utils::error::{AppError, AppResult};

use super::extractor::extract_events;
use super::types::{
    ClarificationQuestion, ProtocolEvent, StepProgress, WorkflowPhase, WorkflowStep,
};

/// Fixed system instruction describing the structured output protocol.
const PLAN_MODE_SYSTEM_INSTRUCTION: &str = r#"You are a task execution assistant working through a plan/approve/execute protocol.

Communicate state changes by embedding JSON objects in your responses, using these exact shapes:

Ask ONE clarifying question when the request is ambiguous:
{"type":"clarification","question":"...","options":[{"id":"a","label":"...","description":"...","shortcut":"a"}],"allowCustom":true,"allowSkip":false}

Propose a plan once the request is clear:
{"type":"plan","title":"...","steps":[{"id":"step-1","label":"...","order":1}],"estimatedArtifacts":[{"type":"document","name":"...","description":"..."}]}

Report step progress while executing:
{"type":"progress","stepId":"step-1","status":"in_progress","message":"..."}

Report produced artifacts:
{"type":"artifact","artifact":{"id":"...","type":"file","name":"...","path":"...","preview":"..."}}

Wrap each JSON object in a ```json fence. Do not execute any step before the plan has been approved."#;

/// Callback invoked when the provider asks a clarification question.
pub type ClarificationCallback = Arc<dyn Fn(&ClarificationQuestion) + Send + Sync>;
/// Callback invoked when the provider proposes a plan.
pub type PlanCallback = Arc<dyn Fn(&[WorkflowStep]) + Send + Sync>;
/// Callback invoked for step progress reports.
pub type StepProgressCallback = Arc<dyn Fn(&StepProgress) + Send + Sync>;
/// Callback invoked when an artifact is reported.
pub type ArtifactCallback = Arc<dyn Fn(&Artifact) + Send + Sync>;

/// The plan-mode workflow state machine.
///
/// Phases: understanding -> clarifying -> planning -> awaiting_approval ->
/// executing. Clarification may loop; rejection returns to planning.
pub struct PlanModeWorkflow {
    provider: Arc<dyn LlmProvider>,
    phase: WorkflowPhase,
    history: Vec<Message>,
    current_question: Option<ClarificationQuestion>,
    /// Recorded clarification answers, in order
    answers: Vec<String>,
    plan_title: String,
    steps: Vec<WorkflowStep>,
    artifacts: HashMap<String, Artifact>,
    on_clarification: Option<ClarificationCallback>,
    on_plan: Option<PlanCallback>,
    on_progress: Option<StepProgressCallback>,
    on_artifact: Option<ArtifactCallback>,
}

impl PlanModeWorkflow {
    /// Create a workflow over the given provider.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            phase: WorkflowPhase::Understanding,
            history: Vec::new(),
            current_question: None,
            answers: Vec::new(),
            plan_title: String::new(),
            steps: Vec::new(),
            artifacts: HashMap::new(),
            on_clarification: None,
            on_plan: None,
            on_progress: None,
            on_artifact: None,
        }
    }

    /// Register the clarification callback.
    pub fn on_clarification(&mut self, callback: ClarificationCallback) {
        self.on_clarification = Some(callback);
    }

    /// Register the plan-proposal callback.
    pub fn on_plan(&mut self, callback: PlanCallback) {
        self.on_plan = Some(callback);
    }

    /// Register the step-progress callback.
    pub fn on_progress(&mut self, callback: StepProgressCallback) {
        self.on_progress = Some(callback);
    }

    /// Register the artifact callback.
    pub fn on_artifact(&mut self, callback: ArtifactCallback) {
        self.on_artifact = Some(callback);
    }

    /// Current workflow phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// The pending clarification question, if any.
    pub fn current_question(&self) -> Option<&ClarificationQuestion> {
        self.current_question.as_ref()
    }

    /// Clarification answers recorded so far, in order.
    pub fn clarification_answers(&self) -> &[String] {
        &self.answers
    }

    /// The proposed plan's steps.
    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// The proposed plan's title.
    pub fn plan_title(&self) -> &str {
        &self.plan_title
    }

    /// Artifacts reported so far, keyed by id.
    pub fn artifacts(&self) -> &HashMap<String, Artifact> {
        &self.artifacts
    }

    /// Start a new task: resets all workflow state, sends the request to the
    /// provider, and routes the response through the event dispatch path.
    pub async fn start_task(&mut self, request: &str) -> AppResult<()> {
        if !self.provider.is_configured() {
            return Err(AppError::configuration(format!(
                "provider '{}' is not configured",
                self.provider.name()
            )));
        }

        self.phase = WorkflowPhase::Understanding;
        self.history.clear();
        self.current_question = None;
        self.answers.clear();
        self.plan_title.clear();
        self.steps.clear();
        self.artifacts.clear();

        self.history.push(Message::user(request));
        let response = self.send().await?;
        self.handle_response(&response);
        Ok(())
    }

    /// Answer the pending clarification question. Records the answer, feeds
    /// it back to the provider, and re-enters the same response-handling
    /// path (which may ask another question or propose a plan).
    pub async fn respond_to_clarification(&mut self, answer: &str) -> AppResult<()> {
        if self.phase != WorkflowPhase::Clarifying {
            return Err(AppError::invalid_state(format!(
                "respond_to_clarification is not valid in phase {}",
                self.phase
            )));
        }

        // The question is consumed exactly once.
        self.current_question = None;
        self.answers.push(answer.to_string());
        self.phase = WorkflowPhase::Planning;

        self.history
            .push(Message::user(format!("User selected: {}", answer)));
        let response = self.send().await?;
        self.handle_response(&response);
        Ok(())
    }

    /// Approve the proposed plan and execute its steps in order, routing
    /// every step result back through the event dispatch path.
    pub async fn approve_plan(&mut self) -> AppResult<()> {
        if self.phase != WorkflowPhase::AwaitingApproval {
            return Err(AppError::invalid_state(format!(
                "approve_plan is not valid in phase {}",
                self.phase
            )));
        }

        self.phase = WorkflowPhase::Executing;

        let step_ids: Vec<String> = self.steps.iter().map(|s| s.id.clone()).collect();
        for step_id in step_ids {
            let label = self
                .steps
                .iter()
                .find(|s| s.id == step_id)
                .map(|s| s.label.clone())
                .unwrap_or_else(|| step_id.clone());

            self.history.push(Message::user(format!(
                "The plan is approved. Execute step {} now: {}",
                step_id, label
            )));
            let response = self.send().await?;
            self.handle_response(&response);

            self.mark_step(&step_id, TaskStatus::Completed);
        }

        Ok(())
    }

    /// Reject the proposed plan with feedback; returns to the planning
    /// phase and asks the provider for a revision.
    pub async fn reject_plan(&mut self, feedback: &str) -> AppResult<()> {
        if self.phase != WorkflowPhase::AwaitingApproval {
            return Err(AppError::invalid_state(format!(
                "reject_plan is not valid in phase {}",
                self.phase
            )));
        }

        self.phase = WorkflowPhase::Planning;
        self.history.push(Message::user(format!(
            "The plan was not approved. Revise it based on this feedback: {}",
            feedback
        )));
        let response = self.send().await?;
        self.handle_response(&response);
        Ok(())
    }

    /// One provider round trip over the accumulated conversation.
    async fn send(&mut self) -> AppResult<String> {
        let response = self
            .provider
            .send_message(
                self.history.clone(),
                Some(PLAN_MODE_SYSTEM_INSTRUCTION.to_string()),
                Vec::new(),
            )
            .await?;

        let text = response.content.unwrap_or_default();
        self.history.push(Message::assistant(text.clone()));
        Ok(text)
    }

    /// Dispatch every structured event found in a response, in scan order.
    /// For state-overwriting events (clarification, plan) the last valid
    /// block wins.
    fn handle_response(&mut self, text: &str) {
        for event in extract_events(text) {
            match event {
                ProtocolEvent::Clarification(question) => {
                    self.phase = WorkflowPhase::Clarifying;
                    if let Some(callback) = self.on_clarification.clone() {
                        callback(&question);
                    }
                    self.current_question = Some(question);
                }
                ProtocolEvent::Plan(proposal) => {
                    self.phase = WorkflowPhase::AwaitingApproval;
                    self.plan_title = proposal.title;
                    self.steps = proposal.steps;
                    if let Some(callback) = self.on_plan.clone() {
                        callback(&self.steps);
                    }
                }
                ProtocolEvent::Progress(progress) => {
                    let known = self
                        .steps
                        .iter_mut()
                        .find(|s| s.id == progress.step_id)
                        .map(|s| s.status = progress.status)
                        .is_some();
                    if known {
                        if let Some(callback) = self.on_progress.clone() {
                            callback(&progress);
                        }
                    } else {
                        debug!("progress event for unknown step '{}'", progress.step_id);
                    }
                }
                ProtocolEvent::Artifact(artifact) => {
                    if let Some(callback) = self.on_artifact.clone() {
                        callback(&artifact);
                    }
                    self.artifacts.insert(artifact.id.clone(), artifact);
                }
            }
        }
    }

    /// Set a step's status and notify the progress callback.
    fn mark_step(&mut self, step_id: &str, status: TaskStatus) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) {
            step.status = status;
            if let Some(callback) = self.on_progress.clone() {
                callback(&StepProgress {
                    step_id: step_id.to_string(),
                    status,
                    message: None,
                });
            }
        }
    }
}
