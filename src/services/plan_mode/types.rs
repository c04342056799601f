//! Plan Mode Types
//!
//! Data structures for the clarification-driven workflow: phases,
//! clarification questions, proposed plan steps, and the structured protocol
//! events parsed out of provider responses.

use serde::{Deserialize, Serialize};

use crate::models::{Artifact, TaskStatus};

/// Plan-mode workflow phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Understanding,
    Clarifying,
    Planning,
    AwaitingApproval,
    Executing,
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPhase::Understanding => write!(f, "understanding"),
            WorkflowPhase::Clarifying => write!(f, "clarifying"),
            WorkflowPhase::Planning => write!(f, "planning"),
            WorkflowPhase::AwaitingApproval => write!(f, "awaiting_approval"),
            WorkflowPhase::Executing => write!(f, "executing"),
        }
    }
}

/// One selectable answer within a clarification question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationOption {
    /// Stable option identifier
    pub id: String,
    /// Short display label
    pub label: String,
    /// Longer explanation of the option
    #[serde(default)]
    pub description: String,
    /// Optional single-key shortcut
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
}

/// A clarification question produced by the provider's structured output.
/// Consumed exactly once by the workflow, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationQuestion {
    /// The question text
    pub question: String,
    /// Ordered answer options
    #[serde(default)]
    pub options: Vec<ClarificationOption>,
    /// Whether a free-text answer is permitted
    #[serde(default)]
    pub allow_custom: bool,
    /// Whether the question may be skipped
    #[serde(default)]
    pub allow_skip: bool,
}

/// One step of a proposed plan, tracked through execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Stable step identifier
    pub id: String,
    /// Display label
    pub label: String,
    /// Position within the plan
    pub order: u32,
    /// Current status
    pub status: TaskStatus,
}

/// An artifact the provider expects the plan to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedArtifact {
    /// Artifact type tag
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name
    pub name: String,
    /// What the artifact will contain
    #[serde(default)]
    pub description: String,
}

/// A proposed plan parsed from the provider's structured output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProposal {
    /// Plan title
    pub title: String,
    /// Ordered steps
    pub steps: Vec<WorkflowStep>,
    /// Artifacts the provider expects to produce
    #[serde(default)]
    pub estimated_artifacts: Vec<EstimatedArtifact>,
}

/// A progress report for one plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    /// Step the report refers to
    pub step_id: String,
    /// Reported status
    pub status: TaskStatus,
    /// Optional human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A structured event extracted from a provider's free-text response.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    Clarification(ClarificationQuestion),
    Plan(PlanProposal),
    Progress(StepProgress),
    Artifact(Artifact),
}
