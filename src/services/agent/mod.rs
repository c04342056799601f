//! Agent Runner
//!
//! The provider-independent half of the adapter contract: plan creation,
//! the bounded tool-calling execution loop, direct execution, and mode
//! dispatch. Wire formatting stays inside the provider variants; everything
//! here works through the `LlmProvider` trait.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use agentflow_llm::types::{
    AgentMode, Message, MessageContent, MessageRole, ToolCallReliability, UsageStats,
};
use agentflow_llm::LlmProvider;
use agentflow_tools::prompt_fallback::{
    build_tool_call_instructions, extract_text_without_tool_calls, format_tool_result,
    parse_tool_calls,
};
use agentflow_tools::ToolRegistry;

use crate::models::{Complexity, ExecutionPlan, PlanStep};
use crate::utils::json::extract_first_json_object;

/// Hard cap on tool-calling iterations within a single step.
pub const MAX_STEP_ITERATIONS: u32 = 10;

/// Words whose presence (two or more distinct matches) routes a task into
/// plan mode.
const PLAN_INDICATOR_WORDS: &[&str] = &[
    "create", "build", "implement", "refactor", "analyze", "multiple", "several", "all", "each",
    "every", "then", "after", "first", "finally",
];

/// Progress reserved for plan creation in a plan-mode run.
const PLAN_PHASE_PROGRESS: u8 = 15;
/// Progress split evenly across step execution.
const STEP_PHASE_PROGRESS: u8 = 80;

/// Async approval gate consulted between plan creation and execution.
pub type ApprovalCallback =
    Arc<dyn Fn(ExecutionPlan) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Outcome of a single step's bounded execution loop.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Whether the step completed (including hitting the iteration cap).
    /// False only when the provider call itself failed.
    pub success: bool,
    /// Accumulated assistant text across all iterations. On provider
    /// failure this still carries any partial output produced before it.
    pub output: String,
    /// Error description when `success` is false
    pub error: Option<String>,
    /// Iterations consumed
    pub iterations: u32,
    /// Token usage accumulated across all provider calls
    pub usage: UsageStats,
}

/// Final result of a `run_agent` invocation.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl AgentResult {
    fn failure(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }
}

/// Resolve `auto` mode with the fixed keyword heuristic: plan iff the
/// lower-cased task text contains at least two distinct indicator words.
pub fn determine_mode(task: &str) -> AgentMode {
    let lowered = task.to_lowercase();
    let words: HashSet<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let matches = PLAN_INDICATOR_WORDS
        .iter()
        .filter(|w| words.contains(**w))
        .count();

    if matches >= 2 {
        AgentMode::Plan
    } else {
        AgentMode::Execute
    }
}

/// Runs tasks against one provider: plan creation, bounded step execution,
/// and mode dispatch.
pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    approval: Option<ApprovalCallback>,
}

impl AgentRunner {
    /// Create a runner over the given provider.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            approval: None,
        }
    }

    /// Install an approval callback consulted before plan execution when the
    /// provider config requires approval.
    pub fn with_approval_callback(mut self, approval: ApprovalCallback) -> Self {
        self.approval = Some(approval);
        self
    }

    /// The provider this runner executes against.
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Ask the provider to decompose a task into an execution plan.
    ///
    /// Any failure — provider error, missing JSON, malformed shape, empty
    /// steps — degrades to the deterministic single-step fallback plan.
    /// Never errors.
    pub async fn create_plan(
        &self,
        task: &str,
        tools: &ToolRegistry,
        context: Option<&str>,
    ) -> ExecutionPlan {
        let mut tools_section = String::new();
        for (name, description) in tools.catalogue() {
            tools_section.push_str(&format!("- {}: {}\n", name, description));
        }
        if tools_section.is_empty() {
            tools_section.push_str("(none)\n");
        }

        let context_section = context
            .map(|c| format!("\n## Context\n{}\n", c))
            .unwrap_or_default();

        let prompt = format!(
            "Create an execution plan for this task:\n{task}\n\
             {context_section}\n\
             ## Available Tools\n{tools_section}\n\
             Respond with ONLY a JSON object in this exact shape:\n\
             ```json\n\
             {{\n\
               \"goal\": \"the overall goal\",\n\
               \"steps\": [\n\
                 {{\"id\": \"step-1\", \"description\": \"...\", \"toolsNeeded\": [], \"dependencies\": []}}\n\
               ],\n\
               \"estimatedComplexity\": \"low|medium|high\",\n\
               \"requiredApprovals\": []\n\
             }}\n\
             ```"
        );

        let text = match self.provider.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("plan creation provider call failed: {}; using fallback", e);
                return ExecutionPlan::fallback(task);
            }
        };

        parse_plan_json(task, &text)
    }

    /// The bounded tool-calling loop for one plan step.
    ///
    /// Each iteration sends the conversation to the provider, collects text
    /// output, and executes every requested tool invocation sequentially —
    /// unknown tools and failing tools become failed results fed back into
    /// the conversation. The loop exits early the moment a turn produces no
    /// tool invocation, and otherwise stops at the iteration cap.
    ///
    /// A provider-call failure yields `success: false` with the accumulated
    /// partial output; it is never silently upgraded to success.
    pub async fn execute_step(
        &self,
        step: &PlanStep,
        tools: &ToolRegistry,
        on_progress: &(dyn Fn(u8, &str) + Send + Sync),
    ) -> StepOutcome {
        let reliability = self.provider.tool_call_reliability();
        let use_prompt_fallback = matches!(reliability, ToolCallReliability::None);
        let scan_text_for_calls = !matches!(reliability, ToolCallReliability::Reliable);

        let definitions = tools.definitions();

        let mut system = String::from(
            "You are executing one step of a larger plan. Use the available \
             tools to complete the step, then summarize what you did.",
        );
        if scan_text_for_calls && !definitions.is_empty() {
            system.push_str("\n\n");
            system.push_str(&build_tool_call_instructions(&definitions));
        }

        let mut prompt = format!("Execute this step: {}", step.description);
        if !step.tools_needed.is_empty() {
            prompt.push_str(&format!(
                "\nTools expected to be useful: {}",
                step.tools_needed.join(", ")
            ));
        }

        let mut messages = vec![Message::user(prompt)];
        let mut accumulated = String::new();
        let mut usage = UsageStats::default();
        let mut iterations = 0u32;

        while iterations < MAX_STEP_ITERATIONS {
            iterations += 1;
            on_progress(
                ((iterations - 1) * 100 / MAX_STEP_ITERATIONS) as u8,
                &format!("step '{}': iteration {}", step.id, iterations),
            );

            // Providers without native tool calling get the catalogue through
            // the system prompt only.
            let api_tools = if use_prompt_fallback {
                Vec::new()
            } else {
                definitions.clone()
            };

            let response = match self
                .provider
                .send_message(messages.clone(), Some(system.clone()), api_tools)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    return StepOutcome {
                        success: false,
                        output: accumulated,
                        error: Some(e.to_string()),
                        iterations,
                        usage,
                    };
                }
            };

            usage.merge(&response.usage);
            let text = response.content.clone().unwrap_or_default();

            // Gather requested invocations: native first, then fallback
            // blocks in the text when native calling can't be trusted.
            let mut invocations: Vec<(String, String, serde_json::Value)> = response
                .tool_calls
                .iter()
                .map(|tc| (tc.id.clone(), tc.name.clone(), tc.arguments.clone()))
                .collect();

            let mut parsed_from_text = false;
            if invocations.is_empty() && scan_text_for_calls {
                for (i, call) in parse_tool_calls(&text).into_iter().enumerate() {
                    invocations.push((
                        format!("call_{}_{}", iterations, i),
                        call.tool_name,
                        call.arguments,
                    ));
                    parsed_from_text = true;
                }
            }

            // Accumulate the turn's visible text (without raw call blocks).
            let visible = if parsed_from_text {
                extract_text_without_tool_calls(&text)
            } else {
                text.clone()
            };
            if !visible.is_empty() {
                if !accumulated.is_empty() {
                    accumulated.push('\n');
                }
                accumulated.push_str(&visible);
            }

            // Natural completion: a turn with no tool invocation ends the loop.
            if invocations.is_empty() {
                return StepOutcome {
                    success: true,
                    output: accumulated,
                    error: None,
                    iterations,
                    usage,
                };
            }

            // Record the assistant turn in the conversation.
            if parsed_from_text {
                messages.push(Message::assistant(text));
            } else {
                let mut content = Vec::new();
                if !text.is_empty() {
                    content.push(MessageContent::Text { text });
                }
                for (id, name, args) in &invocations {
                    content.push(MessageContent::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: args.clone(),
                    });
                }
                messages.push(Message {
                    role: MessageRole::Assistant,
                    content,
                });
            }

            // Execute the invocations one after another, never concurrently;
            // every result is fed back before the next provider turn.
            for (id, name, args) in invocations {
                let result = tools.execute(&name, args).await;
                debug!(
                    "step '{}': tool '{}' -> success={}",
                    step.id, name, result.success
                );

                if parsed_from_text {
                    messages.push(Message::user(format_tool_result(
                        &name,
                        &id,
                        &result.as_conversation_text(),
                        !result.success,
                    )));
                } else {
                    messages.push(Message::tool_result(
                        id,
                        result.as_conversation_text(),
                        !result.success,
                    ));
                }
            }
        }

        // Iteration cap reached: stop regardless of provider state and
        // return what was accumulated.
        StepOutcome {
            success: true,
            output: accumulated,
            error: None,
            iterations,
            usage,
        }
    }

    /// Direct (non-planned) execution: wrap the task in a synthetic single
    /// step and run the same bounded loop.
    pub async fn execute_directly(
        &self,
        task: &str,
        tools: &ToolRegistry,
        on_progress: &(dyn Fn(u8, &str) + Send + Sync),
    ) -> StepOutcome {
        let step = PlanStep::new("direct-1", task);
        self.execute_step(&step, tools, on_progress).await
    }

    /// Mode dispatch: resolve `auto`, then either plan/approve/execute or
    /// run directly. Per-step progress is mapped onto a global 0-100 scale:
    /// 15% for plan creation, 80% split evenly across steps, with the
    /// remaining slack closed on completion.
    pub async fn run_agent(
        &self,
        task: &str,
        tools: &ToolRegistry,
        on_progress: &(dyn Fn(u8, &str) + Send + Sync),
        mode_override: Option<AgentMode>,
    ) -> AgentResult {
        let configured = mode_override.unwrap_or(self.provider.config().mode);
        let mode = match configured {
            AgentMode::Auto => determine_mode(task),
            other => other,
        };

        match mode {
            AgentMode::Execute | AgentMode::Auto => {
                on_progress(5, "executing directly");
                let outcome = self.execute_directly(task, tools, on_progress).await;
                if outcome.success {
                    on_progress(100, "done");
                    AgentResult {
                        success: true,
                        output: outcome.output,
                        error: None,
                    }
                } else {
                    on_progress(100, "failed");
                    AgentResult {
                        success: false,
                        error: outcome.error,
                        output: outcome.output,
                    }
                }
            }
            AgentMode::Plan => {
                on_progress(5, "planning");
                let plan = self.create_plan(task, tools, None).await;
                on_progress(PLAN_PHASE_PROGRESS, "plan created");

                // Approval is skipped unless required by config AND a
                // callback was supplied.
                if self.provider.config().plan_approval_required {
                    if let Some(approval) = &self.approval {
                        on_progress(PLAN_PHASE_PROGRESS, "awaiting approval");
                        if !approval(plan.clone()).await {
                            on_progress(100, "plan rejected");
                            return AgentResult::failure("Plan rejected", String::new());
                        }
                    }
                }

                let total_steps = plan.steps.len().max(1);
                let mut outputs: Vec<String> = Vec::new();

                for (index, step) in plan.steps.iter().enumerate() {
                    let base =
                        PLAN_PHASE_PROGRESS + (STEP_PHASE_PROGRESS as usize * index / total_steps) as u8;
                    on_progress(base, &format!("executing step {}/{}", index + 1, total_steps));

                    let span = STEP_PHASE_PROGRESS as usize / total_steps;
                    let step_progress = |p: u8, msg: &str| {
                        on_progress(base + (span * p as usize / 100) as u8, msg);
                    };

                    let outcome = self.execute_step(step, tools, &step_progress).await;
                    if !outcome.success {
                        // A single step failure aborts the remaining steps.
                        on_progress(100, &format!("step {} failed", step.id));
                        return AgentResult::failure(
                            outcome
                                .error
                                .unwrap_or_else(|| format!("Step {} failed", step.id)),
                            outputs.join("\n\n"),
                        );
                    }
                    outputs.push(outcome.output);

                    let done = PLAN_PHASE_PROGRESS
                        + (STEP_PHASE_PROGRESS as usize * (index + 1) / total_steps) as u8;
                    on_progress(done, &format!("step {}/{} complete", index + 1, total_steps));
                }

                on_progress(100, "done");
                AgentResult {
                    success: true,
                    output: outputs.join("\n\n"),
                    error: None,
                }
            }
        }
    }
}

/// Parse the provider-facing plan JSON shape into an `ExecutionPlan`,
/// falling back to the single-step plan on any defect.
fn parse_plan_json(task: &str, text: &str) -> ExecutionPlan {
    let Some(json_str) = extract_first_json_object(text) else {
        warn!("no JSON object in plan response; using fallback");
        return ExecutionPlan::fallback(task);
    };

    let parsed: serde_json::Value = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("plan JSON malformed ({}); using fallback", e);
            return ExecutionPlan::fallback(task);
        }
    };

    let Some(steps_value) = parsed.get("steps").and_then(|v| v.as_array()) else {
        warn!("plan JSON missing 'steps' array; using fallback");
        return ExecutionPlan::fallback(task);
    };

    let steps: Vec<PlanStep> = steps_value
        .iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let description = value
                .get("description")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())?;

            let id = value
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("step-{}", i + 1));

            let mut step = PlanStep::new(id, description);
            step.tools_needed = string_array(value.get("toolsNeeded"));
            step.dependencies = string_array(value.get("dependencies"));
            Some(step)
        })
        .collect();

    if steps.is_empty() {
        warn!("plan JSON has no usable steps; using fallback");
        return ExecutionPlan::fallback(task);
    }

    let estimated_complexity = match parsed.get("estimatedComplexity").and_then(|v| v.as_str()) {
        Some("low") => Complexity::Low,
        Some("high") => Complexity::High,
        _ => Complexity::Medium,
    };

    ExecutionPlan {
        goal: parsed
            .get("goal")
            .and_then(|v| v.as_str())
            .unwrap_or(task)
            .to_string(),
        steps,
        estimated_complexity,
        required_approvals: string_array(parsed.get("requiredApprovals")),
    }
}

fn string_array(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
