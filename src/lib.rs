//! # agent-orchestra
//!
//! In-process multi-agent task orchestration.
//!
//! Specialized agents (task manager, code analyst, security auditor,
//! performance optimizer, memory curator, developer) live in an
//! [`AgentRegistry`] that routes tasks and messages between them. The
//! [`Orchestrator`] turns a request into a workflow over those roles and
//! runs it sequentially, in parallel or as an entry role plus follow-ups.
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_orchestra::{AgentRegistry, InMemoryStore, Orchestrator};
//!
//! # async fn demo() {
//! let registry = AgentRegistry::new(InMemoryStore::shared());
//! registry.create_default_agents().await;
//! let orchestrator = Orchestrator::new(Arc::new(registry));
//! let result = orchestrator
//!     .smart_route("review the login module", serde_json::json!({}))
//!     .await;
//! println!("{}", result.success);
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod registry;
pub mod tools;
pub mod types;

pub use agents::{Agent, AgentContext, BehaviorTable, RoleBehavior, TemplateSet};
pub use config::EngineConfig;
pub use error::{AgentError, ConfigError, MemoryError, OrchestrationError, ToolError};
pub use memory::{EventRecord, InMemoryStore, MemoryStore, NullMemoryStore};
pub use orchestrator::{
    OrchestrationRequest, OrchestrationResult, Orchestrator, OrchestratorMetrics, Strategy,
};
pub use registry::{AgentRegistry, SystemMetrics};
pub use tools::{StaticToolExecutor, ToolExecutor};
pub use types::{
    AgentConfig, AgentMessage, AgentMetrics, AgentResponse, AgentRole, AgentStatus, Capability,
    MessageType, Priority, TaskAssignment, TaskMetadata,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
