//! Bounded execution loop behavior against scripted providers.

use agentflow::llm::types::{AgentMode, MessageContent, ToolCallReliability};
use agentflow::models::PlanStep;
use agentflow::{determine_mode, AgentRunner, TaskPlanner};

use crate::support::{
    echo_registry, no_progress, text_response, tool_call_response, MockProvider,
};

#[tokio::test]
async fn step_loop_terminates_within_ten_iterations() {
    // The provider requests a tool call on every turn and never signals
    // completion; the cap must cut it off at exactly 10 provider calls.
    let provider = MockProvider::new(
        ToolCallReliability::Reliable,
        tool_call_response("Echo", serde_json::json!({"message": "again"})),
    );
    let runner = AgentRunner::new(provider.clone());

    let step = PlanStep::new("step-1", "never finishes on its own");
    let outcome = runner
        .execute_step(&step, &echo_registry(), &no_progress())
        .await;

    assert_eq!(outcome.iterations, 10);
    assert_eq!(provider.call_count(), 10);
    assert!(outcome.success);
}

#[tokio::test]
async fn unknown_tool_result_is_fed_back_and_loop_continues() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("Recovered."));
    provider.push(Ok(tool_call_response(
        "browser_click",
        serde_json::json!({"selector": "#go"}),
    )));
    let runner = AgentRunner::new(provider.clone());

    let step = PlanStep::new("step-1", "click something");
    let outcome = runner
        .execute_step(&step, &echo_registry(), &no_progress())
        .await;

    // The lookup failure did not terminate the loop: a second provider turn
    // ran and completed naturally.
    assert!(outcome.success);
    assert_eq!(provider.call_count(), 2);

    // The failed ToolResult was fed back into the conversation verbatim.
    let conversations = provider.received();
    let second_turn = &conversations[1];
    let fed_back = second_turn.iter().any(|msg| {
        msg.content.iter().any(|content| {
            matches!(
                content,
                MessageContent::ToolResult { content, is_error, .. }
                    if content == "Tool not found: browser_click" && *is_error == Some(true)
            )
        })
    });
    assert!(fed_back, "expected the tool-not-found result in the conversation");
}

#[tokio::test]
async fn multiple_tool_calls_in_one_turn_run_sequentially() {
    let mut response = tool_call_response("Echo", serde_json::json!({"message": "one"}));
    response
        .tool_calls
        .push(agentflow::llm::types::ToolCall {
            id: "call_two".to_string(),
            name: "Echo".to_string(),
            arguments: serde_json::json!({"message": "two"}),
        });

    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("Done."));
    provider.push(Ok(response));
    let runner = AgentRunner::new(provider.clone());

    let step = PlanStep::new("step-1", "two calls");
    let outcome = runner
        .execute_step(&step, &echo_registry(), &no_progress())
        .await;
    assert!(outcome.success);

    // Both results came back in order in the follow-up conversation.
    let second_turn = &provider.received()[1];
    let results: Vec<&str> = second_turn
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| match c {
            MessageContent::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec!["one", "two"]);
}

#[tokio::test]
async fn prompt_fallback_provider_drives_tools_through_text() {
    let provider = MockProvider::new(ToolCallReliability::None, text_response("All wrapped up."));
    provider.push(Ok(text_response(
        "Checking.\n```tool_call\n{\"tool\": \"Echo\", \"arguments\": {\"message\": \"ping\"}}\n```",
    )));
    let runner = AgentRunner::new(provider.clone());

    let step = PlanStep::new("step-1", "fallback run");
    let outcome = runner
        .execute_step(&step, &echo_registry(), &no_progress())
        .await;

    assert!(outcome.success);
    assert_eq!(provider.call_count(), 2);

    // The tool result went back as formatted text, not a structured block.
    let second_turn = &provider.received()[1];
    let has_text_result = second_turn.iter().any(|msg| {
        msg.content.iter().any(|content| {
            matches!(
                content,
                MessageContent::Text { text } if text.contains("[Tool Result: Echo") && text.contains("ping")
            )
        })
    });
    assert!(has_text_result);
}

#[test]
fn mode_heuristic_matches_specified_examples() {
    assert_eq!(determine_mode("Create a file"), AgentMode::Execute);
    assert_eq!(
        determine_mode("Create and then implement multiple modules"),
        AgentMode::Plan
    );
    assert_eq!(determine_mode("fix typo"), AgentMode::Execute);
    assert_eq!(
        determine_mode("First analyze the data, finally build the report"),
        AgentMode::Plan
    );
}

#[tokio::test]
async fn plan_parse_fallback_matches_between_planner_and_runner() {
    // The planner and the agent runner apply the same fallback policy
    // independently: one medium-complexity step named after the task.
    let prose = "Sounds good, let me think about how to approach this.";
    let task = "reorganize the archive";

    let planner = TaskPlanner::new();
    let items = planner.parse_plan_response(task, prose);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, task);

    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response(prose));
    let runner = AgentRunner::new(provider);
    let plan = runner.create_plan(task, &echo_registry(), None).await;
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].description, task);
}
