//! OpenAI Provider
//!
//! Implementation of the LlmProvider trait for OpenAI's Chat Completions API.
//! Hosted frontier provider with reliable native tool calling.

use async_trait::async_trait;
use serde::Deserialize;

use agentflow_core::streaming::{chat_channel, ChatStream};

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::sse::{parse_openai_compatible_data, pump_sse};
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, MessageContent, MessageRole, ProviderConfig,
    StopReason, ToolCall, ToolCallReliability, ToolDefinition, UsageStats,
};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Models listing endpoint, used for credential validation
const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
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

        let mut openai_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            if msg.role == MessageRole::System {
                openai_messages.push(serde_json::json!({
                    "role": "system",
                    "content": msg.text_content()
                }));
            } else {
                openai_messages.push(self.message_to_openai(msg));
            }
        }

        body["messages"] = serde_json::json!(openai_messages);

        if !tools.is_empty() {
            let openai_tools: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_openai(t)).collect();
            body["tools"] = serde_json::json!(openai_tools);
        }

        body
    }

    /// Convert a Message to OpenAI API format
    fn message_to_openai(&self, message: &Message) -> serde_json::Value {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        let has_tool_calls = message
            .content
            .iter()
            .any(|c| matches!(c, MessageContent::ToolUse { .. }));
        let has_tool_results = message
            .content
            .iter()
            .any(|c| matches!(c, MessageContent::ToolResult { .. }));

        if has_tool_results {
            // Tool results are sent as "tool"-role messages in OpenAI format
            let mut result_msg = serde_json::json!({
                "role": "tool"
            });

            for content in &message.content {
                if let MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } = content
                {
                    result_msg["tool_call_id"] = serde_json::json!(tool_use_id);
                    result_msg["content"] = serde_json::json!(content);
                    break;
                }
            }

            return result_msg;
        }

        if has_tool_calls {
            let tool_calls: Vec<serde_json::Value> = message
                .content
                .iter()
                .filter_map(|c| {
                    if let MessageContent::ToolUse { id, name, input } = c {
                        Some(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string()
                            }
                        }))
                    } else {
                        None
                    }
                })
                .collect();

            let mut msg = serde_json::json!({
                "role": role,
                "tool_calls": tool_calls
            });

            let text_content = message.text_content();
            if !text_content.is_empty() {
                msg["content"] = serde_json::json!(text_content);
            }

            return msg;
        }

        serde_json::json!({
            "role": role,
            "content": message.text_content()
        })
    }

    /// Convert a ToolDefinition to OpenAI API format
    fn tool_to_openai(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema
            }
        })
    }

    /// Parse a response from OpenAI API
    fn parse_response(&self, response: &OpenAIResponse) -> LlmResponse {
        let choice = response.choices.first();

        let mut content = None;
        let mut tool_calls = Vec::new();

        if let Some(choice) = choice {
            if let Some(msg) = &choice.message {
                content = msg.content.clone();

                if let Some(tcs) = &msg.tool_calls {
                    for tc in tcs {
                        // Arguments arrive as a JSON-encoded string
                        let arguments: serde_json::Value =
                            serde_json::from_str(&tc.function.arguments)
                                .unwrap_or(serde_json::Value::Null);

                        tool_calls.push(ToolCall {
                            id: tc.id.clone(),
                            name: tc.function.name.clone(),
                            arguments,
                        });
                    }
                }
            }
        }

        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
            model: response.model.clone(),
        }
    }

    /// Issue one POST to the completions endpoint and return the response on 200.
    async fn post_completions(&self, body: &serde_json::Value) -> LlmResult<reqwest::Response> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let response = self
            .client
            .post(self.base_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
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
        let Some(api_key) = self.config.api_key.as_ref() else {
            return false;
        };

        // Listing models is the cheapest authenticated round trip.
        let response = self
            .client
            .get(OPENAI_MODELS_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await;

        matches!(response, Ok(r) if r.status().as_u16() == 200)
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &tools, false);
        let response = self.post_completions(&body).await?;

        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&openai_response))
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<ChatStream> {
        let body = self.build_request_body(&messages, None, &tools, true);
        let response = self.post_completions(&body).await?;

        let (sender, stream) = chat_channel();
        tokio::spawn(pump_sse(response, sender, parse_openai_compatible_data));
        Ok(stream)
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
