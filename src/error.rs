//! Error types for the orchestration engine.
//!
//! One enum per layer. Agent-level errors never escape `Agent::execute_task`
//! (they become failed `AgentResponse`s) and orchestration-level errors never
//! escape `Orchestrator::orchestrate` (they become failed results).

use thiserror::Error;

/// Errors raised by the tool/capability executor collaborator.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// No tool with that name is registered with the executor.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool ran and reported a failure.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// The tool did not answer in time.
    #[error("Tool timed out after {0}ms")]
    Timeout(u64),
}

/// Errors raised by the event/memory collaborator.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// The backing store is not reachable.
    #[error("Memory store unavailable: {0}")]
    Unavailable(String),

    /// The event payload was rejected.
    #[error("Invalid memory event: {0}")]
    InvalidEvent(String),
}

/// Errors raised at the agent boundary.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent already holds its maximum number of in-flight tasks.
    #[error("Agent {agent_id} is at capacity ({max} concurrent tasks)")]
    Capacity { agent_id: String, max: usize },

    /// No agent with the given id is registered.
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// The agent tried to use a tool it was not granted.
    #[error("Agent {agent_id} has no access to tool '{tool}'")]
    ToolAccessDenied { agent_id: String, tool: String },

    /// No tool executor is attached to the agent.
    #[error("No tool executor configured")]
    NoToolExecutor,

    /// A tool invocation failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A memory write failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Role-specific processing failed.
    #[error("Role logic failed: {0}")]
    RoleLogic(String),
}

/// Errors raised while planning or driving a workflow.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The workflow names a role with no live agent.
    #[error("No agent available for role '{0}'")]
    NoAgentForRole(String),

    /// The workflow's entry point is not one of its roles.
    #[error("Entry point '{0}' is not part of the workflow")]
    UnknownEntryPoint(String),

    /// The workflow has no roles at all.
    #[error("Workflow '{0}' has no participating roles")]
    EmptyWorkflow(String),

    /// A dispatch or planning step panicked.
    #[error("Orchestration panicked: {0}")]
    Panicked(String),

    /// The request deadline has already passed.
    #[error("Deadline exceeded")]
    Deadline,
}

/// Errors raised while loading configuration or templates.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Turn a panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
