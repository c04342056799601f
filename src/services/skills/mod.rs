//! Skill Registry
//!
//! Skills are named instruction packs that can be injected into provider
//! prompts, optionally restricting which tools a task may use. The registry
//! is owned by the orchestrator; there is no process-wide skill state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named instruction pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    /// Stable skill identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// One-line summary used for selection
    pub description: String,
    /// Instructions injected into the system prompt when the skill applies
    pub instructions: String,
    /// Tool names this skill permits; empty means no restriction
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

/// Registry of skills, keyed by id, preserving registration order.
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Skill>,
    order: Vec<String>,
}

impl SkillRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill. A skill with the same id is replaced.
    pub fn register(&mut self, skill: Skill) {
        if !self.skills.contains_key(&skill.id) {
            self.order.push(skill.id.clone());
        }
        self.skills.insert(skill.id.clone(), skill);
    }

    /// Look up a skill by id.
    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    /// Registered skill ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Build the system-prompt section carrying every skill's instructions.
    /// Returns an empty string when no skills are registered.
    pub fn prompt_section(&self) -> String {
        if self.skills.is_empty() {
            return String::new();
        }

        let mut section = String::from("## Skills\n");
        for id in &self.order {
            if let Some(skill) = self.skills.get(id) {
                section.push_str(&format!(
                    "\n### {}\n{}\n{}\n",
                    skill.name, skill.description, skill.instructions
                ));
            }
        }
        section
    }
}
