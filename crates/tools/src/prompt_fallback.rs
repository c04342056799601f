//! Prompt-Based Tool Calling Fallback
//!
//! For LLM providers that don't support native function/tool calling (e.g.,
//! Ollama), this module injects tool descriptions into the system prompt and
//! parses tool call blocks from the LLM's text responses. This is the
//! think/act/observe marker format the execution loop watches for when the
//! provider cannot emit structured tool calls.

use serde::{Deserialize, Serialize};

use agentflow_llm::types::ToolDefinition;

/// A tool call parsed from the LLM's text response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedToolCall {
    /// The name of the tool to call
    pub tool_name: String,
    /// The arguments as a JSON value
    pub arguments: serde_json::Value,
    /// The raw text block that was parsed
    pub raw_text: String,
}

/// Build the prompt-based tool calling instructions to inject into the system prompt.
///
/// This instructs the LLM to output tool calls in a specific parseable format.
pub fn build_tool_call_instructions(tools: &[ToolDefinition]) -> String {
    let mut tool_descriptions = String::new();

    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n", tool.name));
        tool_descriptions.push_str(&format!("{}\n", tool.description));

        // Describe parameters
        if let Some(properties) = tool.input_schema.properties.as_ref() {
            if !properties.is_empty() {
                tool_descriptions.push_str("Parameters:\n");
                let required = tool
                    .input_schema
                    .required
                    .as_ref()
                    .cloned()
                    .unwrap_or_default();
                for (name, schema) in properties {
                    let type_str = &schema.schema_type;
                    let req_marker = if required.contains(name) {
                        " (required)"
                    } else {
                        " (optional)"
                    };
                    let desc = schema.description.as_deref().unwrap_or("");
                    tool_descriptions.push_str(&format!(
                        "  - `{}` ({}{}): {}\n",
                        name, type_str, req_marker, desc
                    ));
                }
            }
        }
        tool_descriptions.push('\n');
    }

    format!(
        r#"## Tool Calling

You have access to the following tools. To use a tool, output a tool call block in this EXACT format:

```tool_call
{{"tool": "ToolName", "arguments": {{"param1": "value1", "param2": "value2"}}}}
```

IMPORTANT:
- The block MUST start with ```tool_call and end with ```
- The JSON MUST be valid
- You can make multiple tool calls in a single response
- After making tool calls, STOP and WAIT for the actual results before continuing
- NEVER fabricate, predict, or describe tool results — only use REAL results provided after tool execution
- Only use tools from the list below

## Available Tools

{tool_descriptions}When you receive a tool result, analyze it and decide whether to make more tool calls or provide your final response."#,
        tool_descriptions = tool_descriptions,
    )
}

/// Parse tool call blocks from an LLM text response.
///
/// Matches ```tool_call ... ``` markdown blocks containing a JSON object of
/// the form `{"tool": "Name", "arguments": {...}}`. Blocks whose content does
/// not parse are skipped.
pub fn parse_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();

    let mut remaining = text;
    while let Some(start) = remaining.find("```tool_call") {
        let after_marker = &remaining[start + 12..]; // skip "```tool_call"

        // Find the closing ```
        if let Some(end) = after_marker.find("```") {
            let block_content = after_marker[..end].trim();

            if let Some((tool_name, arguments)) = parse_single_tool_call(block_content) {
                calls.push(ParsedToolCall {
                    tool_name,
                    arguments,
                    raw_text: format!("```tool_call\n{}\n```", block_content),
                });
            } else {
                tracing::debug!("Skipping unparseable tool_call block: {}", block_content);
            }

            remaining = &after_marker[end + 3..];
        } else {
            break;
        }
    }

    calls
}

/// Parse a single tool call JSON payload into (name, arguments).
fn parse_single_tool_call(content: &str) -> Option<(String, serde_json::Value)> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;

    let tool_name = value.get("tool").and_then(|v| v.as_str())?.to_string();
    if tool_name.is_empty() {
        return None;
    }

    let arguments = value
        .get("arguments")
        .cloned()
        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

    Some((tool_name, arguments))
}

/// Remove tool call blocks from a response, leaving only the surrounding text.
pub fn extract_text_without_tool_calls(text: &str) -> String {
    let mut result = String::new();
    let mut remaining = text;

    while let Some(start) = remaining.find("```tool_call") {
        result.push_str(&remaining[..start]);

        let after_marker = &remaining[start + 12..];
        if let Some(end) = after_marker.find("```") {
            remaining = &after_marker[end + 3..];
        } else {
            result.push_str(&remaining[start..]);
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);

    result.trim().to_string()
}

/// Format a tool result for injection back into the conversation as text.
pub fn format_tool_result(tool_name: &str, tool_id: &str, result: &str, is_error: bool) -> String {
    if is_error {
        format!(
            "[Tool Result: {} (id: {})]\nError: {}",
            tool_name, tool_id, result
        )
    } else {
        format!("[Tool Result: {} (id: {})]\n{}", tool_name, tool_id, result)
    }
}
