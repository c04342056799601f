//! Task Planner
//!
//! Turns a natural-language request into a tree of subtasks. Plan responses
//! come back from a provider as free text; parsing is defensive and always
//! degrades to a deterministic single-item plan rather than erroring.

use tracing::warn;

use crate::models::{Complexity, Task, TaskStatus};
use crate::utils::json::extract_first_json_object;

/// One normalized plan item parsed from a provider's plan response.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    /// What the subtask should accomplish
    pub description: String,
    /// Declared dependencies on sibling items (by id or index)
    pub dependencies: Vec<String>,
    /// Complexity class
    pub complexity: Complexity,
    /// Tool names the item expects to need
    pub tools_needed: Vec<String>,
}

/// Plans task trees and answers structural queries about them.
pub struct TaskPlanner {
    /// Tool catalogue included in planning prompts: (name, description)
    tool_catalogue: Vec<(String, String)>,
}

impl TaskPlanner {
    /// Create a planner with no tool catalogue.
    pub fn new() -> Self {
        Self {
            tool_catalogue: Vec::new(),
        }
    }

    /// Replace the tool catalogue included in planning prompts.
    pub fn set_tool_catalogue(&mut self, catalogue: Vec<(String, String)>) {
        self.tool_catalogue = catalogue;
    }

    /// Planning instructions plus the registered tool catalogue, for
    /// inclusion in a provider prompt.
    pub fn planning_prompt(&self) -> String {
        let mut tools_section = String::new();
        if !self.tool_catalogue.is_empty() {
            tools_section.push_str("\n\n## Available Tools\n");
            for (name, description) in &self.tool_catalogue {
                tools_section.push_str(&format!("- {}: {}\n", name, description));
            }
        }

        format!(
            "Decompose the user's request into concrete subtasks.\n\
             Respond with ONLY a JSON object in this exact shape:\n\
             ```json\n\
             {{\n\
               \"steps\": [\n\
                 {{\n\
                   \"description\": \"What this subtask accomplishes\",\n\
                   \"dependencies\": [],\n\
                   \"complexity\": \"low|medium|high\",\n\
                   \"toolsNeeded\": []\n\
                 }}\n\
               ]\n\
             }}\n\
             ```\n\
             Keep subtasks concrete and independently executable. Use 2-7 \
             subtasks; do not pad simple requests.{}",
            tools_section
        )
    }

    /// Extract plan items from a provider's free-text response.
    ///
    /// On any failure — no JSON object, malformed JSON, missing or empty
    /// `steps` — this deterministically falls back to a single item whose
    /// description is the original request and whose complexity is medium.
    /// Never errors.
    pub fn parse_plan_response(&self, request: &str, text: &str) -> Vec<PlanItem> {
        match self.try_parse_items(text) {
            Some(items) if !items.is_empty() => items,
            _ => {
                warn!("plan response unparseable; falling back to single-item plan");
                vec![PlanItem {
                    description: request.to_string(),
                    dependencies: Vec::new(),
                    complexity: Complexity::Medium,
                    tools_needed: Vec::new(),
                }]
            }
        }
    }

    fn try_parse_items(&self, text: &str) -> Option<Vec<PlanItem>> {
        let json_str = extract_first_json_object(text)?;
        let parsed: serde_json::Value = serde_json::from_str(&json_str).ok()?;

        // Accept either key; some models answer with "subtasks".
        let steps = parsed
            .get("steps")
            .or_else(|| parsed.get("subtasks"))?
            .as_array()?;

        let items: Vec<PlanItem> = steps
            .iter()
            .filter_map(|step| {
                let description = step
                    .get("description")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())?
                    .to_string();

                let dependencies = string_array(step.get("dependencies"));
                let tools_needed = string_array(
                    step.get("toolsNeeded").or_else(|| step.get("tools")),
                );

                let complexity = match step.get("complexity").and_then(|v| v.as_str()) {
                    Some("low") => Complexity::Low,
                    Some("high") => Complexity::High,
                    _ => Complexity::Medium,
                };

                Some(PlanItem {
                    description,
                    dependencies,
                    complexity,
                    tools_needed,
                })
            })
            .collect();

        Some(items)
    }

    /// Build a task tree: the root is the original request, its direct
    /// children are built 1:1 from the plan items.
    ///
    /// The tree is flat: declared dependencies are recorded in metadata but
    /// do not reorder execution.
    pub fn create_task_tree(&self, request: &str, items: &[PlanItem]) -> Task {
        let mut root = Task::new(request);

        for item in items {
            let mut child = Task::new(&item.description);
            child.metadata.complexity = item.complexity;
            child.metadata.required_tools = item.tools_needed.clone();
            child.metadata.dependencies = item.dependencies.clone();
            root.subtasks.push(child);
        }

        root
    }

    /// Complexity-weighted progress (weights low/medium/high = 1/2/3), an
    /// alternative to the tracker's plain average for callers that want
    /// weighted semantics.
    pub fn calculate_progress(&self, task: &Task) -> u8 {
        if task.subtasks.is_empty() {
            return task.progress;
        }

        let mut weighted_sum = 0u64;
        let mut total_weight = 0u64;
        for subtask in &task.subtasks {
            let weight = subtask.metadata.complexity.weight() as u64;
            weighted_sum += weight * self.calculate_progress(subtask) as u64;
            total_weight += weight;
        }

        if total_weight == 0 {
            0
        } else {
            (weighted_sum as f64 / total_weight as f64).round() as u8
        }
    }

    /// Depth-first search for the first task in status pending.
    pub fn get_next_subtask<'a>(&self, task: &'a Task) -> Option<&'a Task> {
        if task.status == TaskStatus::Pending {
            return Some(task);
        }
        for subtask in &task.subtasks {
            if let Some(found) = self.get_next_subtask(subtask) {
                return Some(found);
            }
        }
        None
    }

    /// True iff the task is a completed leaf, or every subtask is
    /// (recursively) complete.
    pub fn is_complete(&self, task: &Task) -> bool {
        if task.subtasks.is_empty() {
            return task.status == TaskStatus::Completed;
        }
        task.subtasks.iter().all(|t| self.is_complete(t))
    }
}

impl Default for TaskPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn string_array(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
