//! Agentflow Tools
//!
//! Core types and trait definitions for the Agentflow tool system:
//! - `ToolResult` - execution result type
//! - `Tool` trait - unified tool interface
//! - `ToolRegistry` - dynamic tool registration and dispatch
//! - `FunctionTool` - closure-based tool creation
//! - `ParsedToolCall` - prompt-fallback tool call parsing
//!
//! Concrete tool implementations (file system, browser automation, etc.) are
//! external collaborators: they implement the `Tool` trait and are registered
//! with the orchestrator's `ToolRegistry`. The engine never inspects a tool's
//! output structurally; it only forwards it back into the provider
//! conversation as serialized data.

pub mod executor;
pub mod prompt_fallback;
pub mod trait_def;

// Re-export core types
pub use executor::ToolResult;
pub use prompt_fallback::{
    build_tool_call_instructions, extract_text_without_tool_calls, format_tool_result,
    parse_tool_calls, ParsedToolCall,
};
pub use trait_def::{FunctionTool, Tool, ToolRegistry};
