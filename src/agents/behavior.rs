//! Role behaviour contract and the per-call context handed to it.
//!
//! Every specialization implements [`RoleBehavior`]; the [`BehaviorTable`]
//! maps a role to a constructor. Roles without an entry get the table's
//! fallback behaviour (the task manager by default).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AgentError;
use crate::memory::{record_quietly, EventRecord, MemoryStore};
use crate::registry::bus::MessageBus;
use crate::tools::ToolExecutor;
use crate::types::{
    AgentConfig, AgentMessage, AgentResponse, AgentRole, MessageType, Priority, TaskAssignment,
    TaskMetadata,
};

use super::roles::{CodeAnalystRole, MemoryCuratorRole, PerformanceOptimizerRole, TaskManagerRole};

// ---------------------------------------------------------------------------
// RoleBehavior
// ---------------------------------------------------------------------------

/// Role-specific logic behind an [`Agent`](super::Agent).
///
/// Implementations may return `Err` or even panic; the agent layer turns
/// both into failed responses.
#[async_trait]
pub trait RoleBehavior: Send + Sync {
    /// Process one task assignment.
    async fn process_task(
        &self,
        ctx: &AgentContext,
        task: &TaskAssignment,
    ) -> Result<AgentResponse, AgentError>;

    /// Handle an inter-agent message.
    ///
    /// The default runs `Request` payloads as tasks and acknowledges
    /// everything else.
    async fn handle_message(
        &self,
        ctx: &AgentContext,
        message: &AgentMessage,
    ) -> Result<AgentResponse, AgentError> {
        match message.message_type {
            MessageType::Request => {
                let task = task_from_payload(ctx.agent_id(), message);
                self.process_task(ctx, &task).await
            }
            MessageType::Response | MessageType::Notification | MessageType::Broadcast => {
                Ok(acknowledge(ctx, message))
            }
        }
    }
}

/// Build a task assignment out of a `Request` message payload.
///
/// The payload may carry `task_type`, `description` and `context`; the
/// message id doubles as the logical task id.
pub fn task_from_payload(agent_id: &str, message: &AgentMessage) -> TaskAssignment {
    let payload = &message.payload;
    let task_type = payload
        .get("task_type")
        .or_else(|| payload.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("request");
    let description = payload.get("description").and_then(Value::as_str).unwrap_or_default();
    let metadata = TaskMetadata::new(task_type, description)
        .with_context(payload.get("context").cloned().unwrap_or(Value::Null));

    let mut task = TaskAssignment::new(message.id.clone(), agent_id, Priority::Medium, metadata);
    task.priority = message.priority;
    task
}

/// Standard acknowledgement for non-request messages.
pub fn acknowledge(ctx: &AgentContext, message: &AgentMessage) -> AgentResponse {
    AgentResponse::success(json!({
        "acknowledged": true,
        "message_id": message.id,
        "from": message.from_agent,
        "by": ctx.agent_id(),
    }))
}

// ---------------------------------------------------------------------------
// AgentContext
// ---------------------------------------------------------------------------

/// Tunables that role logic reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleSettings {
    /// Effort above which the task manager decomposes a task.
    pub decomposition_effort_threshold: f64,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self { decomposition_effort_threshold: 8.0 }
    }
}

/// Everything role logic may touch during one call.
#[derive(Clone)]
pub struct AgentContext {
    pub(crate) config: AgentConfig,
    pub(crate) memory: Arc<dyn MemoryStore>,
    pub(crate) tools: Option<Arc<dyn ToolExecutor>>,
    pub(crate) bus: Weak<MessageBus>,
    pub(crate) settings: RoleSettings,
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent_id", &self.config.id)
            .field("role", &self.config.role)
            .field("has_tools", &self.tools.is_some())
            .finish()
    }
}

impl AgentContext {
    pub fn agent_id(&self) -> &str {
        &self.config.id
    }

    pub fn role(&self) -> &AgentRole {
        &self.config.role
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn settings(&self) -> &RoleSettings {
        &self.settings
    }

    pub fn memory(&self) -> &dyn MemoryStore {
        self.memory.as_ref()
    }

    /// Whether this agent may call `tool` and an executor is attached.
    pub fn can_use_tool(&self, tool: &str) -> bool {
        self.tools.is_some() && self.config.has_tool(tool)
    }

    /// Invoke an external tool on behalf of this agent.
    pub async fn invoke_tool(&self, tool: &str, input: &Value) -> Result<Value, AgentError> {
        if !self.config.has_tool(tool) {
            return Err(AgentError::ToolAccessDenied {
                agent_id: self.config.id.clone(),
                tool: tool.to_string(),
            });
        }
        let executor = self.tools.as_ref().ok_or(AgentError::NoToolExecutor)?;
        Ok(executor.execute(tool, input).await?)
    }

    /// Record an event, never failing the caller.
    pub async fn record(&self, event: EventRecord) {
        record_quietly(self.memory.as_ref(), event).await;
    }

    /// Send a message through the registry. Fire-and-forget.
    pub async fn send_message(&self, to_agent: &str, message_type: MessageType, payload: Value) {
        let message = AgentMessage::new(self.config.id.clone(), to_agent, message_type, payload);
        match self.bus.upgrade() {
            Some(bus) => bus.route(message).await,
            None => log::warn!(
                "Agent '{}' has no registry attached; message to '{}' dropped",
                self.config.id, to_agent,
            ),
        }
    }

    /// Ids of registered agents with the given role (excluding this agent).
    pub fn peers_with_role(&self, role: &AgentRole) -> Vec<String> {
        self.bus
            .upgrade()
            .map(|bus| bus.agents_with_role(role))
            .unwrap_or_default()
            .into_iter()
            .filter(|id| id != &self.config.id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BehaviorTable
// ---------------------------------------------------------------------------

/// Constructor for a role behaviour.
pub type BehaviorFactory = Arc<dyn Fn() -> Arc<dyn RoleBehavior> + Send + Sync>;

/// Wrap a plain constructor as a [`BehaviorFactory`].
pub fn factory_of<B: RoleBehavior + 'static>(make: fn() -> B) -> BehaviorFactory {
    Arc::new(move || Arc::new(make()) as Arc<dyn RoleBehavior>)
}

/// Role → behaviour constructor table with a fallback entry.
#[derive(Clone)]
pub struct BehaviorTable {
    factories: HashMap<AgentRole, BehaviorFactory>,
    fallback: BehaviorFactory,
}

impl fmt::Debug for BehaviorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roles: Vec<&str> = self.factories.keys().map(AgentRole::as_str).collect();
        roles.sort_unstable();
        f.debug_struct("BehaviorTable").field("roles", &roles).finish()
    }
}

impl Default for BehaviorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BehaviorTable {
    /// Empty table whose every role resolves to `fallback`.
    pub fn with_fallback(fallback: BehaviorFactory) -> Self {
        Self { factories: HashMap::new(), fallback }
    }

    /// The shipped behaviours. `developer` and custom roles use the
    /// task-manager fallback.
    pub fn builtin() -> Self {
        let mut table = Self::with_fallback(factory_of(TaskManagerRole::new));
        table.register(AgentRole::TaskManager, factory_of(TaskManagerRole::new));
        table.register(AgentRole::CodeAnalyst, factory_of(CodeAnalystRole::analyst));
        table.register(AgentRole::SecurityAuditor, factory_of(CodeAnalystRole::auditor));
        table.register(AgentRole::PerformanceOptimizer, factory_of(PerformanceOptimizerRole::new));
        table.register(AgentRole::MemoryCurator, factory_of(MemoryCuratorRole::new));
        table
    }

    /// Register (or replace) the constructor for a role.
    pub fn register(&mut self, role: AgentRole, factory: BehaviorFactory) {
        self.factories.insert(role, factory);
    }

    pub fn has_behavior(&self, role: &AgentRole) -> bool {
        self.factories.contains_key(role)
    }

    /// Instantiate the behaviour for `role`.
    pub fn build(&self, role: &AgentRole) -> Arc<dyn RoleBehavior> {
        match self.factories.get(role) {
            Some(factory) => factory(),
            None => {
                log::debug!("No behaviour registered for role '{}', using fallback", role);
                (self.fallback)()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted behaviours shared by the agent, registry and orchestrator tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// What a scripted behaviour does on each call.
    #[derive(Debug, Clone)]
    pub enum Script {
        Succeed(Value),
        SucceedWith(AgentResponse),
        Fail(String),
        Error(String),
        Panic,
        Sleep(Duration),
    }

    /// Behaviour that follows a script and counts its invocations.
    pub struct ScriptedBehavior {
        pub script: Script,
        pub calls: Arc<AtomicUsize>,
        pub messages: Arc<AtomicUsize>,
    }

    impl ScriptedBehavior {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                calls: Arc::new(AtomicUsize::new(0)),
                messages: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl RoleBehavior for ScriptedBehavior {
        async fn process_task(
            &self,
            _ctx: &AgentContext,
            task: &TaskAssignment,
        ) -> Result<AgentResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Succeed(v) => Ok(AgentResponse::success(json!({
                    "value": v,
                    "task_type": task.metadata.task_type,
                    "priority": task.priority,
                    "skills": task.metadata.required_skills,
                    "previous": task.metadata.previous_result,
                }))),
                Script::SucceedWith(resp) => Ok(resp.clone()),
                Script::Fail(e) => Ok(AgentResponse::failure(e.clone())),
                Script::Error(e) => Err(AgentError::RoleLogic(e.clone())),
                Script::Panic => panic!("scripted panic"),
                Script::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(AgentResponse::success(json!("slept")))
                }
            }
        }

        async fn handle_message(
            &self,
            ctx: &AgentContext,
            message: &AgentMessage,
        ) -> Result<AgentResponse, AgentError> {
            self.messages.fetch_add(1, Ordering::SeqCst);
            Ok(acknowledge(ctx, message))
        }
    }

    /// Factory returning one shared scripted behaviour instance.
    pub fn factory(behavior: Arc<ScriptedBehavior>) -> BehaviorFactory {
        Arc::new(move || behavior.clone() as Arc<dyn RoleBehavior>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NullMemoryStore;
    use crate::tools::StaticToolExecutor;

    fn context(tools: Vec<String>, executor: Option<Arc<dyn ToolExecutor>>) -> AgentContext {
        AgentContext {
            config: AgentConfig::new("a-1", AgentRole::CodeAnalyst, "Analyst").with_tools(tools),
            memory: Arc::new(NullMemoryStore),
            tools: executor,
            bus: Weak::new(),
            settings: RoleSettings::default(),
        }
    }

    #[test]
    fn test_builtin_table_fallback() {
        let table = BehaviorTable::builtin();
        assert!(table.has_behavior(&AgentRole::CodeAnalyst));
        assert!(table.has_behavior(&AgentRole::SecurityAuditor));
        assert!(!table.has_behavior(&AgentRole::Developer));
        assert!(!table.has_behavior(&AgentRole::Custom("ux".into())));
        // Building an unregistered role must still yield a behaviour.
        let _ = table.build(&AgentRole::Custom("ux".into()));
    }

    #[tokio::test]
    async fn test_tool_access_is_checked() {
        let exec: Arc<dyn ToolExecutor> =
            Arc::new(StaticToolExecutor::new().with_tool("lint", json!({"ok": true})));

        let denied = context(vec![], Some(exec.clone()));
        assert!(matches!(
            denied.invoke_tool("lint", &json!({})).await,
            Err(AgentError::ToolAccessDenied { .. })
        ));

        let no_exec = context(vec!["lint".into()], None);
        assert!(matches!(
            no_exec.invoke_tool("lint", &json!({})).await,
            Err(AgentError::NoToolExecutor)
        ));

        let ok = context(vec!["lint".into()], Some(exec));
        assert!(ok.can_use_tool("lint"));
        assert_eq!(ok.invoke_tool("lint", &json!({})).await.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_send_without_registry_is_harmless() {
        let ctx = context(vec![], None);
        ctx.send_message("nobody", MessageType::Notification, json!({})).await;
        assert!(ctx.peers_with_role(&AgentRole::CodeAnalyst).is_empty());
    }

    #[test]
    fn test_task_from_request_payload() {
        let msg = AgentMessage::new(
            "task-manager-001",
            "code-analyst-001",
            MessageType::Request,
            json!({"task_type": "security_audit", "description": "audit login", "context": {"code": "x"}}),
        );
        let task = task_from_payload("code-analyst-001", &msg);
        assert_eq!(task.task_id, msg.id);
        assert_eq!(task.metadata.task_type, "security_audit");
        assert_eq!(task.metadata.context_str("code"), Some("x"));
        assert_eq!(task.assigned_agent, "code-analyst-001");
    }
}
