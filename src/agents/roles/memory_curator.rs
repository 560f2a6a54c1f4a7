//! Memory curator: forwards knowledge to the memory store and triggers its
//! decay pass.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::behavior::{AgentContext, RoleBehavior};
use crate::error::AgentError;
use crate::memory::EventRecord;
use crate::types::{AgentResponse, TaskAssignment};

use super::trace_task;

/// Categories every organized knowledge payload is filed under.
pub const KNOWLEDGE_CATEGORIES: [&str; 4] =
    ["code_patterns", "decisions", "lessons_learned", "project_context"];

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCuratorRole;

impl MemoryCuratorRole {
    pub fn new() -> Self {
        Self
    }

    fn is_optimization(task_type: &str) -> bool {
        matches!(task_type, "optimize" | "optimization" | "memory_optimization" | "system_optimization")
    }

    /// Knowledge payload: `context.knowledge`, else the upstream result,
    /// else the whole context.
    fn payload(task: &TaskAssignment) -> Value {
        let meta = &task.metadata;
        meta.context
            .get("knowledge")
            .cloned()
            .or_else(|| meta.previous_result.clone())
            .unwrap_or_else(|| meta.context.clone())
    }

    async fn organize(ctx: &AgentContext, task: &TaskAssignment) -> AgentResponse {
        let payload = Self::payload(task);
        let item_count = match &payload {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        };

        let mut event = EventRecord::new(
            "knowledge_organization",
            json!({
                "agent_id": ctx.agent_id(),
                "categories": KNOWLEDGE_CATEGORIES,
                "payload": payload,
            }),
        )
        .with_description(task.metadata.description.clone())
        .with_task_id(task.task_id.clone());
        if let Some(project) = task.metadata.context_str("project_id") {
            event = event.with_project_id(project);
        }
        ctx.record(event).await;

        AgentResponse::success(json!({
            "action": "organized",
            "item_count": item_count,
            "categories": KNOWLEDGE_CATEGORIES,
        }))
    }

    async fn optimize(ctx: &AgentContext) -> Result<AgentResponse, AgentError> {
        let report = ctx.memory().apply_decay().await?;
        log::info!(
            "Memory curator '{}' archived {} of {} events",
            ctx.agent_id(),
            report.archived,
            report.examined,
        );
        Ok(AgentResponse::success(json!({
            "action": "decay_applied",
            "report": report,
        })))
    }
}

#[async_trait]
impl RoleBehavior for MemoryCuratorRole {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        task: &TaskAssignment,
    ) -> Result<AgentResponse, AgentError> {
        trace_task(ctx, task);
        if Self::is_optimization(&task.metadata.task_type) {
            Self::optimize(ctx).await
        } else {
            Ok(Self::organize(ctx, task).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::roles::test_context::{context, task};
    use crate::error::MemoryError;
    use crate::memory::{DecayReport, InMemoryStore, MemoryStore};
    use crate::types::{AgentRole, TaskMetadata};
    use std::sync::Arc;

    struct DownStore;

    #[async_trait]
    impl MemoryStore for DownStore {
        async fn record_event(&self, _event: EventRecord) -> Result<(), MemoryError> {
            Err(MemoryError::Unavailable("offline".into()))
        }

        async fn apply_decay(&self) -> Result<DecayReport, MemoryError> {
            Err(MemoryError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_organization_records_event() {
        let store = InMemoryStore::shared();
        let ctx = context(AgentRole::MemoryCurator, store.clone(), vec![], None);
        let t = task(
            TaskMetadata::new("knowledge_organization", "file review notes")
                .with_context(json!({"knowledge": ["a", "b", "c"], "project_id": "p-9"})),
        );

        let resp = MemoryCuratorRole::new().process_task(&ctx, &t).await.unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["item_count"], 3);
        assert_eq!(result["categories"].as_array().unwrap().len(), 4);

        let events = store.events_of_type("knowledge_organization");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].project_id.as_deref(), Some("p-9"));
        assert_eq!(events[0].data["payload"], json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_optimization_runs_decay() {
        let store = Arc::new(InMemoryStore::default().with_decay(0.1, 0.5));
        store.record_event(EventRecord::new("note", json!(1))).await.unwrap();
        let ctx = context(AgentRole::MemoryCurator, store.clone(), vec![], None);

        let t = task(TaskMetadata::new("memory_optimization", ""));
        let resp = MemoryCuratorRole::new().process_task(&ctx, &t).await.unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["action"], "decay_applied");
        assert_eq!(result["report"]["archived"], 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let ctx = context(AgentRole::MemoryCurator, Arc::new(DownStore), vec![], None);

        // Recording is fire-and-forget.
        let organize = task(TaskMetadata::new("documentation", "x").with_context(json!({"k": 1})));
        let resp = MemoryCuratorRole::new().process_task(&ctx, &organize).await.unwrap();
        assert_eq!(resp.result.unwrap()["item_count"], 1);

        // Decay failures are reported.
        let optimize = task(TaskMetadata::new("optimize", ""));
        let err = MemoryCuratorRole::new().process_task(&ctx, &optimize).await.unwrap_err();
        assert!(matches!(err, AgentError::Memory(MemoryError::Unavailable(_))));
    }
}
