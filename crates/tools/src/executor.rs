//! Tool Execution Result
//!
//! The portable result type produced by every tool execution. The engine
//! forwards `output` back into the provider conversation without inspecting
//! its structure.

use serde::{Deserialize, Serialize};

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(output: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Create a successful result from plain text
    pub fn ok_text(output: impl Into<String>) -> Self {
        Self::ok(serde_json::Value::String(output.into()))
    }

    /// Create an error result
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Serialized form fed back into the provider conversation.
    pub fn as_conversation_text(&self) -> String {
        if self.success {
            match &self.output {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            }
        } else {
            self.error.clone().unwrap_or_else(|| "Unknown error".to_string())
        }
    }
}
