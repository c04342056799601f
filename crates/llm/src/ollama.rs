//! Ollama Provider
//!
//! Implementation of the LlmProvider trait for Ollama local inference using
//! the ollama-rs native SDK. Runs without API keys. Ollama models do not emit
//! structured tool calls dependably, so this provider reports
//! `ToolCallReliability::None` and the execution loop drives tools through
//! the prompt-based fallback format instead.

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage, ChatMessageResponse, MessageRole as OllamaRole};
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use tokio_stream::StreamExt;

use agentflow_core::streaming::{chat_channel, ChatStream};

use super::provider::LlmProvider;
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, MessageContent, MessageRole, ProviderConfig,
    StopReason, ToolCallReliability, ToolDefinition, UsageStats,
};

/// Default Ollama API endpoint
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Ollama provider for local inference using the native ollama-rs SDK
pub struct OllamaProvider {
    config: ProviderConfig,
    client: Ollama,
}

impl OllamaProvider {
    /// Create a new Ollama provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        let client = Self::create_client(base_url);
        Self { config, client }
    }

    /// Create an Ollama SDK client from a base URL string.
    ///
    /// Parses the URL to extract host and port for `Ollama::new()`.
    /// Falls back to `Ollama::default()` if parsing fails.
    fn create_client(base_url: &str) -> Ollama {
        if let Ok(parsed) = url::Url::parse(base_url) {
            let scheme = parsed.scheme();
            let host = parsed.host_str().unwrap_or("localhost");
            let port = parsed.port().unwrap_or(11434);
            // Ollama::new takes host and port separately
            let host_url = format!("{}://{}", scheme, host);
            Ollama::new(host_url, port)
        } else {
            Ollama::default()
        }
    }

    /// Get the base URL for the Ollama server (used in error messages)
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL)
    }

    /// Build a ChatMessageRequest from our unified types
    fn build_chat_request(&self, messages: &[Message], system: Option<&str>) -> ChatMessageRequest {
        let mut chat_messages: Vec<ChatMessage> = Vec::new();

        if let Some(sys) = system {
            chat_messages.push(ChatMessage::system(sys.to_string()));
        }

        for msg in messages {
            chat_messages.extend(self.convert_message(msg));
        }

        let mut request = ChatMessageRequest::new(self.config.model.clone(), chat_messages);

        let mut opts = ModelOptions::default().temperature(self.config.temperature);
        if self.config.max_tokens > 0 {
            opts = opts.num_predict(self.config.max_tokens as i32);
        }
        request = request.options(opts);

        request
    }

    /// Convert a unified Message to ollama-rs ChatMessage(s).
    ///
    /// Tool results are flattened into user text because the prompt-fallback
    /// format carries them inline rather than as a dedicated role.
    fn convert_message(&self, message: &Message) -> Vec<ChatMessage> {
        let mut text_parts: Vec<String> = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text { text } => {
                    text_parts.push(text.clone());
                }
                MessageContent::ToolResult { content, .. } => {
                    text_parts.push(content.clone());
                }
                MessageContent::ToolUse { name, input, .. } => {
                    text_parts.push(format!("Calling tool {} with {}", name, input));
                }
            }
        }

        let combined = text_parts.join("\n");
        let role = match message.role {
            MessageRole::User => OllamaRole::User,
            MessageRole::Assistant => OllamaRole::Assistant,
            MessageRole::System => OllamaRole::System,
        };
        vec![ChatMessage::new(role, combined)]
    }

    /// Convert an ollama-rs ChatMessageResponse to our unified LlmResponse.
    fn convert_response(&self, response: &ChatMessageResponse) -> LlmResponse {
        let usage = if let Some(final_data) = &response.final_data {
            UsageStats {
                input_tokens: final_data.prompt_eval_count as u32,
                output_tokens: final_data.eval_count as u32,
            }
        } else {
            UsageStats::default()
        };

        let content = response.message.content.clone();

        LlmResponse {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage,
            model: response.model.clone(),
        }
    }

    /// Map an ollama-rs error to our unified error type.
    fn convert_error(&self, error: impl std::fmt::Display) -> LlmError {
        let msg = error.to_string();
        if msg.contains("connect") || msg.contains("Connection refused") {
            LlmError::ProviderUnavailable {
                message: format!("Cannot connect to Ollama at {}: {}", self.base_url(), msg),
            }
        } else if msg.contains("not found") || msg.contains("404") {
            LlmError::ModelNotFound {
                model: self.config.model.clone(),
            }
        } else {
            LlmError::NetworkError { message: msg }
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        false
    }

    fn tool_call_reliability(&self) -> ToolCallReliability {
        ToolCallReliability::None
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_configured(&self) -> bool {
        // No credential needed; a model name is the only requirement.
        !self.config.model.is_empty()
    }

    async fn validate_credential(&self) -> bool {
        // No API key to validate; check that the server is reachable.
        self.client.list_local_models().await.is_ok()
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        _tools: Vec<ToolDefinition>,
    ) -> LlmResult<LlmResponse> {
        let request = self.build_chat_request(&messages, system.as_deref());

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| self.convert_error(e))?;

        Ok(self.convert_response(&response))
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
    ) -> LlmResult<ChatStream> {
        let request = self.build_chat_request(&messages, None);

        let mut ollama_stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| self.convert_error(e))?;

        let (sender, stream) = chat_channel();
        tokio::spawn(async move {
            while let Some(chunk) = ollama_stream.next().await {
                let Ok(response) = chunk else {
                    break;
                };
                if !response.message.content.is_empty()
                    && !sender.text(response.message.content.clone()).await
                {
                    // Consumer stopped pulling; stop producing.
                    return;
                }
                if response.done {
                    break;
                }
            }
            sender.done(Some("end_turn".to_string())).await;
        });

        Ok(stream)
    }
}
