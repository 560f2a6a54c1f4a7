//! Shipped role behaviours.

pub mod code_analyst;
pub mod memory_curator;
pub mod performance_optimizer;
pub mod task_manager;

pub use code_analyst::{AnalystMode, CodeAnalystRole};
pub use memory_curator::MemoryCuratorRole;
pub use performance_optimizer::PerformanceOptimizerRole;
pub use task_manager::TaskManagerRole;

use crate::agents::behavior::AgentContext;
use crate::types::{AgentRole, TaskAssignment};

/// Static task-type → specialist lookup shared by the task manager.
pub fn role_for_task_type(task_type: &str) -> AgentRole {
    match task_type.trim().to_lowercase().as_str() {
        "analysis" | "code_review" | "review" | "testing" => AgentRole::CodeAnalyst,
        "security" | "security_audit" => AgentRole::SecurityAuditor,
        "performance" | "optimization" | "system_optimization" => AgentRole::PerformanceOptimizer,
        "documentation" | "knowledge" | "memory" | "knowledge_organization" => {
            AgentRole::MemoryCurator
        }
        _ => AgentRole::Developer,
    }
}

/// Source code attached to a task, if any.
///
/// Looks at `context.code` first, then at a `code` field of the upstream
/// result when the task was chained.
pub(crate) fn source_of(task: &TaskAssignment) -> Option<&str> {
    task.metadata.context_str("code").or_else(|| {
        task.metadata
            .previous_result
            .as_ref()
            .and_then(|prev| prev.pointer("/result/code"))
            .and_then(|v| v.as_str())
    })
}

/// Debug line shared by the role implementations.
pub(crate) fn trace_task(ctx: &AgentContext, task: &TaskAssignment) {
    log::debug!(
        "{} '{}' processing '{}' task {}",
        ctx.role(),
        ctx.agent_id(),
        task.metadata.task_type,
        task.id,
    );
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskMetadata, Priority};
    use serde_json::json;

    #[test]
    fn test_static_lookup() {
        assert_eq!(role_for_task_type("analysis"), AgentRole::CodeAnalyst);
        assert_eq!(role_for_task_type("Testing"), AgentRole::CodeAnalyst);
        assert_eq!(role_for_task_type("security_audit"), AgentRole::SecurityAuditor);
        assert_eq!(role_for_task_type("optimization"), AgentRole::PerformanceOptimizer);
        assert_eq!(role_for_task_type("documentation"), AgentRole::MemoryCurator);
        assert_eq!(role_for_task_type("implementation"), AgentRole::Developer);
        assert_eq!(role_for_task_type("anything else"), AgentRole::Developer);
    }

    #[test]
    fn test_source_from_context_or_upstream() {
        let direct = TaskAssignment::new(
            "t",
            "a",
            Priority::Low,
            TaskMetadata::new("code_review", "").with_context(json!({"code": "fn a() {}"})),
        );
        assert_eq!(source_of(&direct), Some("fn a() {}"));

        let chained = TaskAssignment::new(
            "t",
            "a",
            Priority::Low,
            TaskMetadata::new("code_review", "")
                .with_previous_result(json!({"success": true, "result": {"code": "fn b() {}"}})),
        );
        assert_eq!(source_of(&chained), Some("fn b() {}"));

        let none = TaskAssignment::new("t", "a", Priority::Low, TaskMetadata::new("x", ""));
        assert_eq!(source_of(&none), None);
    }
}
