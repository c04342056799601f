//! Anthropic Claude Provider
//!
//! Implementation of the LlmProvider trait for Anthropic's Claude API.
//! Hosted frontier provider with reliable native tool calling.

use async_trait::async_trait;
use serde::Deserialize;

use agentflow_core::streaming::{chat_channel, ChatStream};

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::sse::{pump_sse, SseDelta};
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, MessageContent, MessageRole, ProviderConfig,
    StopReason, ToolCall, ToolCallReliability, ToolDefinition, UsageStats,
};

/// Default Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Current API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL)
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": stream,
        });

        // System is a top-level field in the Messages API. Fold any
        // System-role messages from the conversation into it as well.
        let mut system_parts: Vec<&str> = Vec::new();
        if let Some(sys) = system {
            system_parts.push(sys);
        }
        for msg in messages {
            if msg.role == MessageRole::System {
                for content in &msg.content {
                    if let MessageContent::Text { text } = content {
                        system_parts.push(text);
                    }
                }
            }
        }
        if !system_parts.is_empty() {
            body["system"] = serde_json::json!(system_parts.join("\n\n"));
        }

        let claude_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| self.message_to_claude(m))
            .collect();
        body["messages"] = serde_json::json!(claude_messages);

        if !tools.is_empty() {
            let claude_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(claude_tools);
        }

        body
    }

    /// Convert a Message to Claude API format
    fn message_to_claude(&self, message: &Message) -> serde_json::Value {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "user", // Shouldn't happen, filtered out
        };

        let content: Vec<serde_json::Value> = message
            .content
            .iter()
            .map(|c| match c {
                MessageContent::Text { text } => {
                    serde_json::json!({
                        "type": "text",
                        "text": text
                    })
                }
                MessageContent::ToolUse { id, name, input } => {
                    serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input
                    })
                }
                MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let mut result = serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content
                    });
                    if let Some(true) = is_error {
                        result["is_error"] = serde_json::json!(true);
                    }
                    result
                }
            })
            .collect();

        serde_json::json!({
            "role": role,
            "content": content
        })
    }

    /// Parse a response from Claude API
    fn parse_response(&self, response: &ClaudeResponse) -> LlmResponse {
        let mut content = None;
        let mut tool_calls = Vec::new();

        for block in &response.content {
            match block {
                ClaudeContentBlock::Text { text } => {
                    content = Some(text.clone());
                }
                ClaudeContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: input.clone(),
                    });
                }
            }
        }

        let stop_reason = response
            .stop_reason
            .as_deref()
            .map(StopReason::from)
            .unwrap_or(StopReason::EndTurn);

        LlmResponse {
            content,
            tool_calls,
            stop_reason,
            usage: UsageStats {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
            model: response.model.clone(),
        }
    }

    /// Issue one POST to the Messages endpoint and return the raw body on 200.
    async fn post_messages(&self, body: &serde_json::Value) -> LlmResult<reqwest::Response> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("anthropic"))?;

        let response = self
            .client
            .post(self.base_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body_text, "anthropic"));
        }

        Ok(response)
    }
}

/// Map one Anthropic SSE data payload to a chat stream delta.
fn parse_claude_stream_data(value: &serde_json::Value) -> SseDelta {
    match value["type"].as_str() {
        Some("content_block_delta") => {
            if let Some(text) = value["delta"]["text"].as_str() {
                SseDelta::Text(text.to_string())
            } else {
                SseDelta::Skip
            }
        }
        Some("message_delta") => {
            if let Some(reason) = value["delta"]["stop_reason"].as_str() {
                SseDelta::Stop(reason.to_string())
            } else {
                SseDelta::Skip
            }
        }
        Some("message_stop") => SseDelta::Done,
        _ => SseDelta::Skip,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn tool_call_reliability(&self) -> ToolCallReliability {
        ToolCallReliability::Reliable
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .map(|k| !k.is_empty())
            .unwrap_or(false)
            && !self.config.model.is_empty()
    }

    async fn validate_credential(&self) -> bool {
        if !self.is_configured() {
            return false;
        }
        // Minimal one-token round trip; any error means invalid.
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "ping"}],
        });
        self.post_messages(&body).await.is_ok()
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &tools, false);
        let response = self.post_messages(&body).await?;

        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let claude_response: ClaudeResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&claude_response))
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<ChatStream> {
        let body = self.build_request_body(&messages, None, &tools, true);
        let response = self.post_messages(&body).await?;

        let (sender, stream) = chat_channel();
        tokio::spawn(pump_sse(response, sender, parse_claude_stream_data));
        Ok(stream)
    }
}

/// Claude API response format
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    model: String,
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            provider: super::super::types::ProviderType::Anthropic,
            api_key: Some("sk-ant-test".to_string()),
            model: "claude-3-5-sonnet-20241022".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new(test_config());
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-3-5-sonnet-20241022");
        assert!(provider.supports_tools());
        assert_eq!(
            provider.tool_call_reliability(),
            ToolCallReliability::Reliable
        );
    }

    #[test]
    fn test_is_configured() {
        assert!(AnthropicProvider::new(test_config()).is_configured());

        let no_key = ProviderConfig {
            api_key: None,
            ..test_config()
        };
        assert!(!AnthropicProvider::new(no_key).is_configured());

        let empty_key = ProviderConfig {
            api_key: Some(String::new()),
            ..test_config()
        };
        assert!(!AnthropicProvider::new(empty_key).is_configured());
    }

    #[test]
    fn test_build_request_body_separates_system() {
        let provider = AnthropicProvider::new(test_config());
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let body = provider.build_request_body(&messages, Some("base prompt"), &[], false);

        assert_eq!(body["system"], "base prompt\n\nbe terse");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "user");
    }

    #[test]
    fn test_message_to_claude_tool_result() {
        let provider = AnthropicProvider::new(test_config());
        let msg = Message::tool_result("toolu_1", "file contents", true);
        let value = provider.message_to_claude(&msg);
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "tool_result");
        assert_eq!(value["content"][0]["is_error"], true);
    }

    #[test]
    fn test_parse_response_with_tool_use() {
        let provider = AnthropicProvider::new(test_config());
        let raw = r#"{
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Reading the file."},
                {"type": "tool_use", "id": "toolu_1", "name": "Read", "input": {"path": "a.rs"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }"#;
        let parsed: ClaudeResponse = serde_json::from_str(raw).unwrap();
        let response = provider.parse_response(&parsed);

        assert_eq!(response.content.as_deref(), Some("Reading the file."));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "Read");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.total_tokens(), 30);
    }

    #[test]
    fn test_parse_claude_stream_data() {
        let delta = serde_json::json!({
            "type": "content_block_delta",
            "delta": {"type": "text_delta", "text": "chunk"}
        });
        assert!(matches!(
            parse_claude_stream_data(&delta),
            SseDelta::Text(t) if t == "chunk"
        ));

        let stop = serde_json::json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn"}
        });
        assert!(matches!(
            parse_claude_stream_data(&stop),
            SseDelta::Stop(r) if r == "end_turn"
        ));

        let end = serde_json::json!({"type": "message_stop"});
        assert!(matches!(parse_claude_stream_data(&end), SseDelta::Done));
    }
}
