//! Plan Mode Service
//!
//! The clarification-driven workflow entry point:
//! - Structured-output extraction from provider free text
//! - Phase machine (understanding, clarifying, planning, approval, execution)
//! - Artifact registry and event callbacks

pub mod extractor;
pub mod types;
pub mod workflow;

pub use extractor::extract_events;
pub use types::{
    ClarificationOption, ClarificationQuestion, EstimatedArtifact, PlanProposal, ProtocolEvent,
    StepProgress, WorkflowPhase, WorkflowStep,
};
pub use workflow::{
    ArtifactCallback, ClarificationCallback, PlanCallback, PlanModeWorkflow, StepProgressCallback,
};
