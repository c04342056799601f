//! Agentflow LLM
//!
//! Provides a unified interface for interacting with multiple LLM providers:
//! - Anthropic Claude (hosted, native tool calling)
//! - OpenAI (hosted, native tool calling)
//! - GLM (ZhipuAI; hosted, tool calling present but not guaranteed)
//! - Ollama (local inference, no native tool calling)
//!
//! Every provider implements the [`LlmProvider`] contract; callers obtain a
//! concrete variant through [`create_provider`], keyed by provider id.

pub mod anthropic;
pub mod glm;
pub mod ollama;
pub mod openai;
pub mod provider;
mod sse;
pub mod types;

// Re-export main types
pub use anthropic::AnthropicProvider;
pub use glm::GlmProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{create_provider, LlmProvider};
pub use types::*;

// Re-export the chat stream types providers return
pub use agentflow_core::streaming::{ChatChunk, ChatStream};
