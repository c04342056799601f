//! Tool Trait and Registry
//!
//! Defines the unified `Tool` trait interface and `ToolRegistry` for dynamic
//! tool registration, lookup, and execution. Tool implementations live
//! outside this workspace (file system, browser automation, etc.); the
//! engine talks to them only through this contract.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use agentflow_llm::types::{ParameterSchema, ToolDefinition};

use crate::executor::ToolResult;

/// Unified tool interface.
///
/// Each tool in the system implements this trait, providing:
/// - Identity (name, description, parameters schema)
/// - Execution logic
///
/// Tools are registered in a `ToolRegistry` and dispatched dynamically.
/// Implementations report failures through `ToolResult::err`; the registry
/// additionally converts panics into failed results so a misbehaving tool
/// can never take down the execution loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of this tool (e.g., "Read", "Bash", "Grep")
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does
    fn description(&self) -> &str;

    /// JSON schema describing the tool's input parameters
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with the given arguments.
    ///
    /// Returns a `ToolResult` indicating success/failure with output or error.
    async fn execute(&self, args: Value) -> ToolResult;
}

/// Registry of available tools.
///
/// Provides O(1) lookup by name, dynamic registration/unregistration, and
/// bulk operations like generating all tool definitions. Cloning produces a
/// snapshot sharing the same tool instances.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. If a tool with the same name already exists, it is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Unregister a tool by name. Returns the removed tool, or None if not found.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.order.retain(|n| n != name);
        self.tools.remove(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, suitable for sending to LLM providers.
    /// Returned in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    /// Get all registered tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Name/description pairs in registration order, for prompt catalogues.
    pub fn catalogue(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| (tool.name().to_string(), tool.description().to_string()))
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name with the given arguments.
    ///
    /// Returns a failed `ToolResult` if the tool is not found, and converts a
    /// panicking tool into a failed result instead of unwinding.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => {
                let tool = tool.clone();
                match tokio::spawn(async move { tool.execute(args).await }).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("Tool '{}' panicked during execution: {}", name, e);
                        ToolResult::err(format!("Tool execution failed: {}", e))
                    }
                }
            }
            None => ToolResult::err(format!("Tool not found: {}", name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── FunctionTool ─────────────────────────────────────────────────────

/// Type alias for the async handler function used by `FunctionTool`.
pub type FunctionToolHandler = Box<
    dyn Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult> + Send>>
        + Send
        + Sync,
>;

/// A tool created from an async closure.
///
/// `FunctionTool` allows rapid creation of simple tools without defining a
/// dedicated struct. Useful for one-off tools or tools generated at runtime.
///
/// # Example
///
/// ```ignore
/// let tool = FunctionTool::new(
///     "Echo",
///     "Echoes the input",
///     ParameterSchema::object(None, HashMap::new(), vec![]),
///     |args| Box::pin(async move {
///         let msg = args.get("message").and_then(|v| v.as_str()).unwrap_or("(empty)");
///         ToolResult::ok_text(msg)
///     }),
/// );
/// ```
pub struct FunctionTool {
    tool_name: String,
    tool_description: String,
    schema: ParameterSchema,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    /// Create a new FunctionTool from an async closure.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult> + Send>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn parameters_schema(&self) -> ParameterSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        (self.handler)(args).await
    }
}
