//! LLM Provider Trait
//!
//! Defines the common interface for all LLM providers, plus the factory that
//! constructs a concrete variant from a [`ProviderConfig`].

use std::sync::Arc;

use async_trait::async_trait;

use agentflow_core::streaming::ChatStream;

use super::anthropic::AnthropicProvider;
use super::glm::GlmProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, ProviderConfig, ProviderType, ToolCallReliability,
    ToolDefinition,
};

/// Trait that all LLM providers must implement.
///
/// Provides a unified interface for:
/// - Single message completions (`send_message`, `complete`)
/// - Streaming completions (`chat`)
/// - Configuration and credential checking
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Returns whether this provider's API accepts tool definitions.
    fn supports_tools(&self) -> bool;

    /// Returns how reliably this provider emits native tool calls.
    fn tool_call_reliability(&self) -> ToolCallReliability;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;

    /// Synchronous check that required credentials/config are present.
    ///
    /// Does not touch the network; a `true` here only means a request can be
    /// attempted, not that the credential is valid.
    fn is_configured(&self) -> bool;

    /// Perform one minimal round-trip call to verify the credential/server.
    ///
    /// Returns `false` on any failure; never errors.
    async fn validate_credential(&self) -> bool;

    /// Send a message and get a complete response.
    ///
    /// # Arguments
    /// * `messages` - Conversation history
    /// * `system` - Optional system prompt
    /// * `tools` - Available tools for the model to use
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<LlmResponse>;

    /// Stream a response as a finite sequence of chunks.
    ///
    /// The returned [`ChatStream`] yields `Text` chunks followed by a single
    /// terminal `Done` chunk and cannot be restarted. Dropping the stream is
    /// the only cancellation mechanism.
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<ChatStream>;

    /// Single non-streaming round trip returning the full text.
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let response = self
            .send_message(vec![Message::user(prompt)], None, vec![])
            .await?;
        Ok(response.content.unwrap_or_default())
    }
}

/// Create a provider instance for the configured provider type.
pub fn create_provider(config: ProviderConfig) -> Arc<dyn LlmProvider> {
    match config.provider {
        ProviderType::Anthropic => Arc::new(AnthropicProvider::new(config)),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(config)),
        ProviderType::Glm => Arc::new(GlmProvider::new(config)),
        ProviderType::Ollama => Arc::new(OllamaProvider::new(config)),
    }
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
