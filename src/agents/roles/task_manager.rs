//! Task manager: estimates effort, then either decomposes a task into
//! analysis / implementation / testing phases or delegates it to one
//! specialist role.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::behavior::{AgentContext, RoleBehavior};
use crate::error::AgentError;
use crate::types::{AgentResponse, AgentRole, MessageType, TaskAssignment};

use super::{role_for_task_type, trace_task};

/// The fixed decomposition phases.
const PHASES: [(&str, &str); 3] = [
    ("analysis", "Analyze requirements and existing code"),
    ("implementation", "Implement the required changes"),
    ("testing", "Verify the changes"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskManagerRole;

impl TaskManagerRole {
    pub fn new() -> Self {
        Self
    }

    /// Effort estimate: an explicit `estimated_effort`/`effort` context field
    /// wins; otherwise two points per required skill plus one per ten words
    /// of description.
    pub fn estimate_effort(task: &TaskAssignment) -> f64 {
        let meta = &task.metadata;
        meta.context_f64("estimated_effort")
            .or_else(|| meta.context_f64("effort"))
            .unwrap_or_else(|| {
                let words = meta.description.split_whitespace().count();
                (meta.required_skills.len() * 2) as f64 + (words / 10) as f64
            })
    }

    fn decompose(task: &TaskAssignment, effort: f64) -> AgentResponse {
        let mut roles: Vec<AgentRole> = Vec::new();
        let mut subtasks = Vec::with_capacity(PHASES.len());
        let mut assignments = serde_json::Map::new();

        for (phase, description) in PHASES {
            let role = role_for_task_type(phase);
            subtasks.push(json!({
                "id": format!("{}-{}", task.task_id, phase),
                "type": phase,
                "description": format!("{}: {}", description, task.metadata.description),
                "role": role,
            }));
            assignments.insert(phase.to_string(), json!(role));
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        AgentResponse::success(json!({
            "action": "decomposed",
            "complexity": effort,
            "subtasks": subtasks,
            "assignments": Value::Object(assignments),
        }))
        .with_collaboration(roles)
    }

    fn delegate(task: &TaskAssignment, effort: f64) -> AgentResponse {
        let role = role_for_task_type(&task.metadata.task_type);
        AgentResponse::success(json!({
            "action": "delegated",
            "delegated_to": role,
            "complexity": effort,
        }))
        .with_collaboration(vec![role])
    }

    async fn notify_specialists(ctx: &AgentContext, task: &TaskAssignment, roles: &[AgentRole]) {
        for role in roles {
            let Some(peer) = ctx.peers_with_role(role).into_iter().next() else {
                log::debug!("No '{}' agent to notify about task {}", role, task.task_id);
                continue;
            };
            ctx.send_message(
                &peer,
                MessageType::Notification,
                json!({
                    "event": "task_delegated",
                    "task_id": task.task_id,
                    "task_type": task.metadata.task_type,
                    "role": role,
                }),
            )
            .await;
        }
    }
}

#[async_trait]
impl RoleBehavior for TaskManagerRole {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        task: &TaskAssignment,
    ) -> Result<AgentResponse, AgentError> {
        trace_task(ctx, task);
        let effort = Self::estimate_effort(task);
        let response = if effort > ctx.settings().decomposition_effort_threshold {
            Self::decompose(task, effort)
        } else {
            Self::delegate(task, effort)
        };
        Self::notify_specialists(ctx, task, &response.collaboration_needed).await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::roles::test_context::{context, task};
    use crate::memory::NullMemoryStore;
    use crate::types::TaskMetadata;
    use std::sync::Arc;

    fn ctx() -> AgentContext {
        context(AgentRole::TaskManager, Arc::new(NullMemoryStore), vec![], None)
    }

    #[test]
    fn test_effort_heuristic() {
        let explicit = task(TaskMetadata::new("x", "").with_context(json!({"effort": 12})));
        assert_eq!(TaskManagerRole::estimate_effort(&explicit), 12.0);

        let words = "word ".repeat(25);
        let implicit = task(
            TaskMetadata::new("x", words.trim())
                .with_required_skills(vec!["api_design".into(), "database".into()]),
        );
        assert_eq!(TaskManagerRole::estimate_effort(&implicit), 6.0);
    }

    #[tokio::test]
    async fn test_small_task_is_delegated() {
        let t = task(TaskMetadata::new("security_audit", "check login"));
        let resp = TaskManagerRole::new().process_task(&ctx(), &t).await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.collaboration_needed, vec![AgentRole::SecurityAuditor]);
        let result = resp.result.unwrap();
        assert_eq!(result["action"], "delegated");
        assert_eq!(result["delegated_to"], "security_auditor");
    }

    #[tokio::test]
    async fn test_large_task_is_decomposed() {
        let t = task(
            TaskMetadata::new("feature_development", "add oauth")
                .with_context(json!({"estimated_effort": 13})),
        );
        let resp = TaskManagerRole::new().process_task(&ctx(), &t).await.unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["action"], "decomposed");
        assert_eq!(result["subtasks"].as_array().unwrap().len(), 3);
        assert_eq!(result["assignments"]["analysis"], "code_analyst");
        assert_eq!(result["assignments"]["implementation"], "developer");
        assert_eq!(result["assignments"]["testing"], "code_analyst");
        assert_eq!(
            resp.collaboration_needed,
            vec![AgentRole::CodeAnalyst, AgentRole::Developer]
        );
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let t = task(TaskMetadata::new("analysis", "").with_context(json!({"effort": 8})));
        let resp = TaskManagerRole::new().process_task(&ctx(), &t).await.unwrap();
        assert_eq!(resp.result.unwrap()["action"], "delegated");
    }
}
