//! Execution Plan Models
//!
//! The provider-driven planning path's data structures. An `ExecutionPlan` is
//! created fresh per `create_plan` call and is not persisted beyond the run.

use serde::{Deserialize, Serialize};

use super::task::{Complexity, TaskStatus};

/// One action within an execution plan, distinct from a Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// Unique step identifier (e.g., "step-1")
    pub id: String,
    /// What this step should accomplish
    pub description: String,
    /// Tool names this step expects to need
    #[serde(default)]
    pub tools_needed: Vec<String>,
    /// Step ids that must complete before this step
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Current status
    pub status: TaskStatus,
}

impl PlanStep {
    /// Create a new pending step.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tools_needed: Vec::new(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
        }
    }
}

/// A complete execution plan produced by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// The goal the plan was created for
    pub goal: String,
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// Overall complexity estimate
    pub estimated_complexity: Complexity,
    /// Markers for operations that require external approval
    #[serde(default)]
    pub required_approvals: Vec<String>,
}

impl ExecutionPlan {
    /// Deterministic single-step fallback used whenever a provider's plan
    /// output cannot be parsed. The step's description is the original task
    /// text and the complexity is medium.
    pub fn fallback(goal: impl Into<String>) -> Self {
        let goal = goal.into();
        Self {
            steps: vec![PlanStep::new("step-1", goal.clone())],
            goal,
            estimated_complexity: Complexity::Medium,
            required_approvals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_plan_shape() {
        let plan = ExecutionPlan::fallback("migrate the database");
        assert_eq!(plan.goal, "migrate the database");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "migrate the database");
        assert_eq!(plan.steps[0].status, TaskStatus::Pending);
        assert_eq!(plan.estimated_complexity, Complexity::Medium);
        assert!(plan.required_approvals.is_empty());
    }

    #[test]
    fn test_plan_serialization_uses_camel_case() {
        let plan = ExecutionPlan {
            goal: "g".to_string(),
            steps: vec![PlanStep {
                id: "step-1".to_string(),
                description: "d".to_string(),
                tools_needed: vec!["Read".to_string()],
                dependencies: vec![],
                status: TaskStatus::Pending,
            }],
            estimated_complexity: Complexity::High,
            required_approvals: vec!["deploy".to_string()],
        };
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"toolsNeeded\""));
        assert!(json.contains("\"estimatedComplexity\":\"high\""));
        assert!(json.contains("\"requiredApprovals\""));
    }
}
