//! Orchestrator inputs, outputs and plans.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{AgentResponse, AgentRole, Priority};

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// High-level work item accepted by [`Orchestrator::orchestrate`](super::Orchestrator::orchestrate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    /// Request type, e.g. `code_review` or `system_optimization`.
    #[serde(rename = "type")]
    pub request_type: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub context: Value,
    /// Absolute deadline; each dispatch is bounded by the remaining time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl OrchestrationRequest {
    pub fn new(request_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            request_type: request_type.into(),
            description: description.into(),
            priority: Priority::Medium,
            context: Value::Null,
            deadline: None,
            required_skills: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_required_skills(mut self, skills: Vec<String>) -> Self {
        self.required_skills = skills;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Outcome bundle of one orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub id: String,
    pub success: bool,
    /// Ids of the agents that received work.
    pub assigned_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<MultiAgentWorkflow>,
    /// Role name → that role's response.
    pub results: BTreeMap<String, AgentResponse>,
    pub duration_ms: u64,
    pub learning_records: Vec<AgentLearningRecord>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Workflow plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    Sequential,
    Parallel,
    Hybrid,
}

impl fmt::Display for CoordinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// What happens when a role fails mid-workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    /// Stop the workflow and report the failure.
    #[default]
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentWorkflow {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Participating roles, in execution order for sequential workflows.
    pub agents: Vec<AgentRole>,
    pub coordination: CoordinationMode,
    pub entry_point: AgentRole,
    pub completion_criteria: Vec<String>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

impl MultiAgentWorkflow {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agents: Vec<AgentRole>,
        coordination: CoordinationMode,
        entry_point: AgentRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            agents,
            coordination,
            entry_point,
            completion_criteria: Vec::new(),
            error_handling: ErrorHandling::Escalate,
        }
    }

    pub fn with_completion_criteria(mut self, criteria: &[&str]) -> Self {
        self.completion_criteria = criteria.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn includes(&self, role: &AgentRole) -> bool {
        self.agents.contains(role)
    }
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningOutcome {
    Success,
    Failure,
}

/// Post-hoc summary of one role's contribution to one orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLearningRecord {
    pub agent_id: String,
    pub role: AgentRole,
    pub scenario: String,
    pub decision: String,
    pub outcome: LearningOutcome,
    pub feedback: String,
    pub improvements: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req: OrchestrationRequest = serde_json::from_value(json!({
            "type": "code_review",
            "description": "review auth module",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(req.request_type, "code_review");
        assert_eq!(req.priority, Priority::High);
        assert!(req.deadline.is_none());
        assert!(req.required_skills.is_empty());
    }

    #[test]
    fn test_workflow_defaults_to_escalation() {
        let wf = MultiAgentWorkflow::new(
            "w",
            "d",
            vec![AgentRole::CodeAnalyst],
            CoordinationMode::Sequential,
            AgentRole::CodeAnalyst,
        );
        assert_eq!(wf.error_handling, ErrorHandling::Escalate);
        assert!(wf.includes(&AgentRole::CodeAnalyst));
        assert!(!wf.includes(&AgentRole::Developer));
        assert_eq!(serde_json::to_value(wf.coordination).unwrap(), json!("sequential"));
    }
}
