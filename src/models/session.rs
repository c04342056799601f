//! Session Model
//!
//! One session per orchestrator instance, owned exclusively by it. Sessions
//! live in memory only; nothing survives a process restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agentflow_llm::types::ProviderConfig;

/// An orchestration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Working directory tasks execute against
    pub working_directory: String,
    /// Context file references supplied by the caller
    #[serde(default)]
    pub context_files: Vec<String>,
    /// Ids of root tasks created during this session
    #[serde(default)]
    pub root_task_ids: Vec<String>,
    /// Active provider configuration
    pub provider_config: ProviderConfig,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session for the given working directory and provider.
    pub fn new(working_directory: impl Into<String>, provider_config: ProviderConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            working_directory: working_directory.into(),
            context_files: Vec::new(),
            root_task_ids: Vec::new(),
            provider_config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a new root task and bump the update timestamp.
    pub fn record_root_task(&mut self, task_id: impl Into<String>) {
        self.root_task_ids.push(task_id.into());
        self.touch();
    }

    /// Bump the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
