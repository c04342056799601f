//! Structured-Output Extractor
//!
//! Scans a provider's free-text response for the structured JSON protocol:
//! fenced ```json blocks and inline JSON objects carrying a
//! `"type": "clarification"|"plan"|"progress"|"artifact"` marker. Each
//! candidate is parsed with strict per-type shape validation; candidates
//! that fail to parse are dropped. Events are returned in scan order — when
//! several blocks of one state-overwriting type appear, the caller applies
//! them in order and the last valid one wins.

use tracing::debug;
use uuid::Uuid;

use crate::models::{Artifact, ArtifactKind, TaskStatus};
use crate::utils::json::scan_json_objects;

use super::types::{
    ClarificationOption, ClarificationQuestion, EstimatedArtifact, PlanProposal, ProtocolEvent,
    StepProgress, WorkflowStep,
};

/// Extract every valid protocol event from a response, in scan order.
pub fn extract_events(text: &str) -> Vec<ProtocolEvent> {
    let mut candidates: Vec<(usize, String)> = Vec::new();

    // Pass 1: fenced ```json blocks
    let fence_spans = collect_fence_candidates(text, &mut candidates);

    // Pass 2: inline JSON objects outside the fences
    for (offset, slice) in scan_json_objects(text) {
        let inside_fence = fence_spans
            .iter()
            .any(|(start, end)| offset >= *start && offset < *end);
        if !inside_fence {
            candidates.push((offset, slice.to_string()));
        }
    }

    candidates.sort_by_key(|(offset, _)| *offset);

    candidates
        .into_iter()
        .filter_map(|(_, candidate)| parse_event(&candidate))
        .collect()
}

/// Collect candidates from ```json fences; returns the fence spans so the
/// inline pass can skip them.
fn collect_fence_candidates(text: &str, candidates: &mut Vec<(usize, String)>) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut search_from = 0;

    while let Some(relative) = text[search_from..].find("```json") {
        let fence_start = search_from + relative;
        let content_start = fence_start + 7;
        let Some(end_relative) = text[content_start..].find("```") else {
            break;
        };
        let content_end = content_start + end_relative;

        for (inner_offset, slice) in scan_json_objects(&text[content_start..content_end]) {
            candidates.push((content_start + inner_offset, slice.to_string()));
        }

        spans.push((fence_start, content_end + 3));
        search_from = content_end + 3;
    }

    spans
}

/// Parse one candidate into a protocol event, validating its shape.
/// Returns None (dropping the candidate) on any mismatch.
fn parse_event(candidate: &str) -> Option<ProtocolEvent> {
    let value: serde_json::Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(e) => {
            debug!("dropping unparseable protocol candidate: {}", e);
            return None;
        }
    };

    match value.get("type").and_then(|v| v.as_str()) {
        Some("clarification") => parse_clarification(&value),
        Some("plan") => parse_plan(&value),
        Some("progress") => parse_progress(&value),
        Some("artifact") => parse_artifact(&value),
        _ => None,
    }
}

fn parse_clarification(value: &serde_json::Value) -> Option<ProtocolEvent> {
    let question = value
        .get("question")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())?
        .to_string();

    let options = value
        .get("options")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|opt| {
                    Some(ClarificationOption {
                        id: opt.get("id").and_then(|v| v.as_str())?.to_string(),
                        label: opt.get("label").and_then(|v| v.as_str())?.to_string(),
                        description: opt
                            .get("description")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                        shortcut: opt
                            .get("shortcut")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ProtocolEvent::Clarification(ClarificationQuestion {
        question,
        options,
        allow_custom: value
            .get("allowCustom")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        allow_skip: value
            .get("allowSkip")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }))
}

fn parse_plan(value: &serde_json::Value) -> Option<ProtocolEvent> {
    let steps_value = value.get("steps").and_then(|v| v.as_array())?;

    let mut steps: Vec<WorkflowStep> = steps_value
        .iter()
        .enumerate()
        .filter_map(|(i, step)| {
            Some(WorkflowStep {
                id: step.get("id").and_then(|v| v.as_str())?.to_string(),
                label: step.get("label").and_then(|v| v.as_str())?.to_string(),
                order: step
                    .get("order")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(i as u64 + 1) as u32,
                status: TaskStatus::Pending,
            })
        })
        .collect();

    if steps.is_empty() {
        debug!("dropping plan event with no valid steps");
        return None;
    }
    steps.sort_by_key(|s| s.order);

    let estimated_artifacts = value
        .get("estimatedArtifacts")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    Some(EstimatedArtifact {
                        kind: a.get("type").and_then(|v| v.as_str())?.to_string(),
                        name: a.get("name").and_then(|v| v.as_str())?.to_string(),
                        description: a
                            .get("description")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ProtocolEvent::Plan(PlanProposal {
        title: value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled Plan")
            .to_string(),
        steps,
        estimated_artifacts,
    }))
}

fn parse_progress(value: &serde_json::Value) -> Option<ProtocolEvent> {
    let step_id = value.get("stepId").and_then(|v| v.as_str())?.to_string();

    let status = match value.get("status").and_then(|v| v.as_str())? {
        "pending" => TaskStatus::Pending,
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        other => {
            debug!("dropping progress event with unknown status '{}'", other);
            return None;
        }
    };

    Some(ProtocolEvent::Progress(StepProgress {
        step_id,
        status,
        message: value
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }))
}

fn parse_artifact(value: &serde_json::Value) -> Option<ProtocolEvent> {
    let payload = value.get("artifact")?;
    let name = payload
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())?
        .to_string();

    let kind = payload
        .get("type")
        .and_then(|v| v.as_str())
        .map(ArtifactKind::from)
        .unwrap_or(ArtifactKind::Other("unknown".to_string()));

    let mut artifact = Artifact::new(kind, name);
    if let Some(id) = payload.get("id").and_then(|v| v.as_str()) {
        if !id.is_empty() {
            artifact.id = id.to_string();
        }
    } else {
        artifact.id = Uuid::new_v4().to_string();
    }
    artifact.path = payload
        .get("path")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    artifact.preview = payload
        .get("preview")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(ProtocolEvent::Artifact(artifact))
}
