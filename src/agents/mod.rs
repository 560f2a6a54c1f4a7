//! Agents: the runtime wrapper, the role behaviour contract, the shipped
//! role behaviours and the role templates used to create agents.

pub mod agent;
pub mod behavior;
pub mod roles;
pub mod templates;

// Re-exports for convenience
pub use agent::{Agent, REMEDIATION_SUGGESTIONS};
pub use behavior::{
    acknowledge, factory_of, task_from_payload, AgentContext, BehaviorFactory, BehaviorTable,
    RoleBehavior, RoleSettings,
};
pub use roles::{CodeAnalystRole, MemoryCuratorRole, PerformanceOptimizerRole, TaskManagerRole};
pub use templates::{AgentTemplate, TemplateSet};
