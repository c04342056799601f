//! Plan-mode workflow flows over the structured output protocol.

use std::sync::{Arc, Mutex};

use agentflow::llm::types::ToolCallReliability;
use agentflow::models::TaskStatus;
use agentflow::{PlanModeWorkflow, WorkflowPhase};

use crate::support::{text_response, MockProvider};

const CLARIFICATION: &str = r#"Before planning I need one answer.
```json
{"type":"clarification","question":"Who is the audience?","options":[{"id":"dev","label":"Developers","description":"Technical readers","shortcut":"d"},{"id":"exec","label":"Executives","description":"Business readers","shortcut":"e"}],"allowCustom":true,"allowSkip":true}
```"#;

const PLAN: &str = r#"Here is my proposal.
```json
{"type":"plan","title":"Quarterly report","steps":[{"id":"s1","label":"Gather data","order":1},{"id":"s2","label":"Write summary","order":2}],"estimatedArtifacts":[{"type":"document","name":"report.md","description":"Final report"}]}
```"#;

#[tokio::test]
async fn full_clarify_approve_execute_flow() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("step done"));
    provider.push(Ok(text_response(CLARIFICATION)));
    provider.push(Ok(text_response(PLAN)));
    provider.push(Ok(text_response(
        r#"```json
{"type":"progress","stepId":"s1","status":"in_progress","message":"collecting"}
```
Data gathered.
```json
{"type":"artifact","artifact":{"id":"data-1","type":"data","name":"metrics.csv","path":"out/metrics.csv"}}
```"#,
    )));
    provider.push(Ok(text_response("Summary written.")));

    let mut workflow = PlanModeWorkflow::new(provider.clone());

    let seen_phases: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let question_sink = seen_phases.clone();
    workflow.on_clarification(Arc::new(move |q| {
        question_sink
            .lock()
            .unwrap()
            .push(format!("clarification:{}", q.options.len()));
    }));
    let plan_sink = seen_phases.clone();
    workflow.on_plan(Arc::new(move |steps| {
        plan_sink.lock().unwrap().push(format!("plan:{}", steps.len()));
    }));
    let artifact_sink = seen_phases.clone();
    workflow.on_artifact(Arc::new(move |artifact| {
        artifact_sink
            .lock()
            .unwrap()
            .push(format!("artifact:{}", artifact.name));
    }));

    // Understanding -> clarifying
    workflow.start_task("prepare the quarterly report").await.unwrap();
    assert_eq!(workflow.phase(), WorkflowPhase::Clarifying);
    let question = workflow.current_question().unwrap();
    assert_eq!(question.options.len(), 2);
    assert!(question.allow_custom);
    assert!(question.allow_skip);

    // Clarifying -> awaiting approval
    workflow.respond_to_clarification("Executives").await.unwrap();
    assert_eq!(workflow.phase(), WorkflowPhase::AwaitingApproval);
    assert_eq!(workflow.plan_title(), "Quarterly report");

    // Approval executes both steps and collects the artifact.
    workflow.approve_plan().await.unwrap();
    assert_eq!(workflow.phase(), WorkflowPhase::Executing);
    assert!(workflow
        .steps()
        .iter()
        .all(|s| s.status == TaskStatus::Completed));
    assert!(workflow.artifacts().contains_key("data-1"));

    let seen = seen_phases.lock().unwrap();
    assert!(seen.contains(&"clarification:2".to_string()));
    assert!(seen.contains(&"plan:2".to_string()));
    assert!(seen.contains(&"artifact:metrics.csv".to_string()));

    // The clarification answer was fed back in the documented format.
    let conversations = provider.received();
    let answered = conversations.iter().flatten().any(|msg| {
        msg.content.iter().any(|c| {
            matches!(
                c,
                agentflow::llm::types::MessageContent::Text { text }
                    if text == "User selected: Executives"
            )
        })
    });
    assert!(answered);
}

#[tokio::test]
async fn rejection_carries_feedback_to_the_provider() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("noted"));
    provider.push(Ok(text_response(PLAN)));
    let mut workflow = PlanModeWorkflow::new(provider.clone());

    workflow.start_task("prepare the report").await.unwrap();
    workflow.reject_plan("combine the two steps").await.unwrap();

    assert_eq!(workflow.phase(), WorkflowPhase::Planning);

    let conversations = provider.received();
    let feedback_sent = conversations.iter().flatten().any(|msg| {
        msg.content.iter().any(|c| {
            matches!(
                c,
                agentflow::llm::types::MessageContent::Text { text }
                    if text.contains("combine the two steps")
            )
        })
    });
    assert!(feedback_sent);
}

#[tokio::test]
async fn malformed_protocol_blocks_are_dropped_silently() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("x"));
    provider.push(Ok(text_response(
        r#"```json
{"type":"plan","title":"Broken","steps":"not an array"}
```
{"type":"clarification","question":""}
Working without structure for now."#,
    )));
    let mut workflow = PlanModeWorkflow::new(provider);

    workflow.start_task("whatever").await.unwrap();
    // Both blocks failed validation: no state was touched.
    assert_eq!(workflow.phase(), WorkflowPhase::Understanding);
    assert!(workflow.steps().is_empty());
    assert!(workflow.current_question().is_none());
}

#[tokio::test]
async fn duplicate_clarifications_last_one_wins() {
    let provider = MockProvider::new(ToolCallReliability::Reliable, text_response("x"));
    provider.push(Ok(text_response(
        r#"{"type":"clarification","question":"First question?"}
On reflection, this is the better question:
{"type":"clarification","question":"Second question?"}"#,
    )));
    let mut workflow = PlanModeWorkflow::new(provider);

    workflow.start_task("ambiguous request").await.unwrap();
    assert_eq!(
        workflow.current_question().unwrap().question,
        "Second question?"
    );
}
