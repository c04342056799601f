//! GLM (ZhipuAI) Provider
//!
//! Implementation of the LlmProvider trait for ZhipuAI's GLM API.
//! Uses the OpenAI-compatible chat completions format. GLM accepts tool
//! definitions but tool call emission is inconsistent, so the execution loop
//! also scans its text output for fallback tool-call blocks.

use async_trait::async_trait;
use serde::Deserialize;

use agentflow_core::streaming::{chat_channel, ChatStream};

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::sse::{parse_openai_compatible_data, pump_sse};
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, MessageContent, MessageRole, ProviderConfig,
    StopReason, ToolCall, ToolCallReliability, ToolDefinition, UsageStats,
};

/// Default GLM API endpoint
const GLM_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// GLM provider
pub struct GlmProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GlmProvider {
    /// Create a new GLM provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(GLM_API_URL)
    }

    /// Build the request body (OpenAI-compatible format)
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

        let mut glm_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system {
            glm_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            glm_messages.push(self.message_to_glm(msg));
        }

        body["messages"] = serde_json::json!(glm_messages);

        if !tools.is_empty() {
            let glm_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(glm_tools);
        }

        body
    }

    /// Convert a Message to GLM (OpenAI-compatible) format
    fn message_to_glm(&self, message: &Message) -> serde_json::Value {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        // Tool results become "tool"-role messages
        for content in &message.content {
            if let MessageContent::ToolResult {
                tool_use_id,
                content,
                ..
            } = content
            {
                return serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content
                });
            }
        }

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
            "content": message.text_content()
        });
        if !tool_calls.is_empty() {
            msg["tool_calls"] = serde_json::json!(tool_calls);
        }
        msg
    }

    /// Parse a response from the GLM API
    fn parse_response(&self, response: &GlmResponse) -> LlmResponse {
        let choice = response.choices.first();

        let mut content = None;
        let mut tool_calls = Vec::new();

        if let Some(choice) = choice {
            if let Some(msg) = &choice.message {
                content = msg.content.clone();

                if let Some(tcs) = &msg.tool_calls {
                    for tc in tcs {
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
            .ok_or_else(|| missing_api_key_error("glm"))?;

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
            return Err(parse_http_error(status, &body_text, "glm"));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for GlmProvider {
    fn name(&self) -> &'static str {
        "glm"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn tool_call_reliability(&self) -> ToolCallReliability {
        ToolCallReliability::Unreliable
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
        // GLM has no cheap models endpoint; use a one-token completion.
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "ping"}],
        });
        self.post_completions(&body).await.is_ok()
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

        let glm_response: GlmResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&glm_response))
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

/// GLM API response format (OpenAI-compatible)
#[derive(Debug, Deserialize)]
struct GlmResponse {
    model: String,
    choices: Vec<GlmChoice>,
    usage: Option<GlmUsage>,
}

#[derive(Debug, Deserialize)]
struct GlmChoice {
    message: Option<GlmMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlmMessage {
    content: Option<String>,
    tool_calls: Option<Vec<GlmToolCall>>,
}

#[derive(Debug, Deserialize)]
struct GlmToolCall {
    id: String,
    function: GlmFunction,
}

#[derive(Debug, Deserialize)]
struct GlmFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct GlmUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
