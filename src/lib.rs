//! Agentflow
//!
//! A task orchestration engine that delegates reasoning to interchangeable
//! LLM providers while enforcing a plan/approve/execute workflow and
//! tracking hierarchical progress. It includes:
//! - Task tree planning with deterministic parse fallbacks
//! - Arena-indexed progress tracking with bottom-up aggregation
//! - A bounded tool-calling execution loop shared by all providers
//! - A clarification-driven plan-mode workflow over a structured JSON protocol
//!
//! Provider variants (Anthropic, OpenAI, GLM, Ollama) live in
//! `agentflow-llm`; the tool contract lives in `agentflow-tools`.

pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used items
pub use models::{
    Artifact, ArtifactKind, Complexity, ExecutionPlan, PlanStep, ProgressUpdate, Session, Task,
    TaskMetadata, TaskStatus,
};
pub use services::agent::{determine_mode, AgentResult, AgentRunner, StepOutcome};
pub use services::orchestrator::{Orchestrator, OrchestratorConfig, TaskRunResult};
pub use services::plan_mode::{
    ClarificationQuestion, PlanModeWorkflow, WorkflowPhase, WorkflowStep,
};
pub use services::planner::{PlanItem, TaskPlanner};
pub use services::progress::{ProgressSummary, ProgressTracker};
pub use services::skills::{Skill, SkillRegistry};
pub use utils::error::{AppError, AppResult};

// Re-export the provider and tool layers for downstream callers
pub use agentflow_llm as llm;
pub use agentflow_tools as tools;
