//! Test support: scripted mock provider and tool fixtures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use agentflow::llm::types::{
    LlmResponse, LlmResult, Message, ParameterSchema, ProviderConfig, StopReason, ToolCall,
    ToolCallReliability, ToolDefinition, UsageStats,
};
use agentflow::llm::LlmProvider;
use agentflow::tools::{FunctionTool, ToolRegistry, ToolResult};
use agentflow_core::streaming::{chat_channel, ChatStream};

/// Scripted provider for integration tests.
///
/// Pops queued responses in order; once the script is exhausted it repeats
/// the configured fallback response. Records every conversation it was sent
/// so tests can assert on fed-back tool results.
pub struct MockProvider {
    config: ProviderConfig,
    reliability: ToolCallReliability,
    script: Mutex<VecDeque<LlmResult<LlmResponse>>>,
    repeat: LlmResponse,
    calls: AtomicU32,
    received: Mutex<Vec<Vec<Message>>>,
    delay: std::time::Duration,
}

impl MockProvider {
    pub fn new(reliability: ToolCallReliability, repeat: LlmResponse) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            reliability,
            script: Mutex::new(VecDeque::new()),
            repeat,
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
            delay: std::time::Duration::ZERO,
        })
    }

    /// Same as `new`, but every call sleeps first (to keep a run in flight).
    pub fn with_delay(
        reliability: ToolCallReliability,
        repeat: LlmResponse,
        delay: std::time::Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            reliability,
            script: Mutex::new(VecDeque::new()),
            repeat,
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn push(&self, response: LlmResult<LlmResponse>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every conversation this provider has been sent, in order.
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn supports_tools(&self) -> bool {
        !matches!(self.reliability, ToolCallReliability::None)
    }

    fn tool_call_reliability(&self) -> ToolCallReliability {
        self.reliability
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn validate_credential(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        _system: Option<String>,
        _tools: Vec<ToolDefinition>,
    ) -> LlmResult<LlmResponse> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(messages);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.repeat.clone()),
        }
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<ChatStream> {
        let response = self.send_message(messages, None, tools).await?;
        let (sender, stream) = chat_channel();
        tokio::spawn(async move {
            if let Some(content) = response.content {
                sender.text(content).await;
            }
            sender.done(Some("end_turn".to_string())).await;
        });
        Ok(stream)
    }
}

/// A plain text response.
pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: Some(text.to_string()),
        tool_calls: vec![],
        stop_reason: StopReason::EndTurn,
        usage: UsageStats {
            input_tokens: 10,
            output_tokens: 5,
        },
        model: "mock-model".to_string(),
    }
}

/// A response requesting exactly one native tool call.
pub fn tool_call_response(name: &str, arguments: serde_json::Value) -> LlmResponse {
    LlmResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments,
        }],
        stop_reason: StopReason::ToolUse,
        usage: UsageStats::default(),
        model: "mock-model".to_string(),
    }
}

/// Registry with a single "Echo" tool that always succeeds.
pub fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FunctionTool::new(
        "Echo",
        "Echoes the input back",
        ParameterSchema::object(None, HashMap::new(), vec![]),
        |args| {
            Box::pin(async move {
                let msg = args
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("(empty)")
                    .to_string();
                ToolResult::ok_text(msg)
            })
        },
    )));
    registry
}

/// No-op progress callback.
pub fn no_progress() -> impl Fn(u8, &str) + Send + Sync {
    |_p: u8, _m: &str| {}
}
