//! Learning records and recommendations derived after each orchestration.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::types::{AgentResponse, AgentRole};

use super::types::{AgentLearningRecord, LearningOutcome, MultiAgentWorkflow};

const LOW_SUCCESS: f64 = 0.5;
const HIGH_SUCCESS: f64 = 0.8;

/// Returned when an orchestration fails before producing role results.
pub const GENERIC_RECOVERY: [&str; 3] = [
    "Check system health and agent availability",
    "Simplify the request and retry",
    "Contact system administrator if the issue persists",
];

/// One record per role that produced a response.
pub fn learning_records(
    workflow: &MultiAgentWorkflow,
    results: &BTreeMap<String, AgentResponse>,
    agent_ids: &BTreeMap<String, String>,
) -> Vec<AgentLearningRecord> {
    workflow
        .agents
        .iter()
        .filter_map(|role| {
            let response = results.get(role.as_str())?;
            Some(record_for(workflow, role, response, agent_ids.get(role.as_str())))
        })
        .collect()
}

fn record_for(
    workflow: &MultiAgentWorkflow,
    role: &AgentRole,
    response: &AgentResponse,
    agent_id: Option<&String>,
) -> AgentLearningRecord {
    let (outcome, feedback) = if response.success {
        (LearningOutcome::Success, "Task completed successfully".to_string())
    } else {
        (
            LearningOutcome::Failure,
            format!("Task failed: {}", response.error.as_deref().unwrap_or("unknown error")),
        )
    };
    AgentLearningRecord {
        agent_id: agent_id.cloned().unwrap_or_default(),
        role: role.clone(),
        scenario: workflow.name.clone(),
        decision: format!("{} participated in {} coordination", role, workflow.coordination),
        outcome,
        feedback,
        improvements: response.suggestions.clone(),
        timestamp: Utc::now(),
    }
}

/// Recommendations from the overall success fraction, failed roles and the
/// suggestions attached to individual responses. Duplicates are removed,
/// first occurrence wins.
pub fn recommendations(results: &BTreeMap<String, AgentResponse>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if results.is_empty() {
        return out;
    }

    let succeeded = results.values().filter(|r| r.success).count();
    let rate = succeeded as f64 / results.len() as f64;
    if rate < LOW_SUCCESS {
        out.push("Consider simplifying the workflow or using fewer agents".into());
        out.push("Check agent load balancing and availability".into());
        out.push("Review task decomposition strategy".into());
    } else if rate > HIGH_SUCCESS {
        out.push("Workflow performed well, keep this coordination pattern".into());
    }

    for (role, response) in results {
        if !response.success {
            out.push(format!("Review {} agent configuration and capabilities", role));
        }
    }
    for response in results.values() {
        out.extend(response.suggestions.iter().cloned());
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|r| seen.insert(r.clone()));
    out
}
