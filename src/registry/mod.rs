//! Agent registry: owns every agent, creates them from role templates,
//! routes inter-agent messages and picks the best agent for a task.

pub mod bus;
pub mod scoring;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::agents::{Agent, BehaviorTable, RoleSettings, TemplateSet};
use crate::agents::templates::default_agent_id;
use crate::config::EngineConfig;
use crate::error::AgentError;
use crate::memory::{record_quietly, EventRecord, MemoryStore};
use crate::tools::ToolExecutor;
use crate::types::{
    AgentConfig, AgentMessage, AgentMetrics, AgentResponse, AgentRole, AgentStatus, TaskAssignment,
};

pub use bus::MessageBus;
pub use scoring::Candidate;

/// Registry-wide aggregate returned by [`AgentRegistry::get_system_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_agents: usize,
    pub agents_by_status: BTreeMap<AgentStatus, usize>,
    pub total_tasks_completed: u64,
    /// Mean of the agents' success rates (0.0 with no agents).
    pub average_success_rate: f64,
    pub total_collaborations: u64,
    pub pending_messages: usize,
    pub delivered_messages: u64,
    pub failed_deliveries: u64,
}

pub struct AgentRegistry {
    agents: Arc<DashMap<String, Arc<Agent>>>,
    bus: Arc<MessageBus>,
    behaviors: BehaviorTable,
    templates: TemplateSet,
    memory: Arc<dyn MemoryStore>,
    tools: Option<Arc<dyn ToolExecutor>>,
    config: EngineConfig,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.len())
            .field("pending_messages", &self.bus.pending())
            .field("behaviors", &self.behaviors)
            .finish()
    }
}

impl AgentRegistry {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        let agents = Arc::new(DashMap::new());
        let bus = Arc::new(MessageBus::new(agents.clone()));
        Self {
            agents,
            bus,
            behaviors: BehaviorTable::builtin(),
            templates: TemplateSet::builtin(),
            memory,
            tools: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: tool executor handed to every agent created afterwards.
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_behaviors(mut self, behaviors: BehaviorTable) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create an agent for `role` from its template.
    ///
    /// Agents are never replaced: if `id` is already registered the existing
    /// agent is returned unchanged.
    pub async fn create_agent(&self, role: AgentRole, id: impl Into<String>) -> Arc<Agent> {
        let id = id.into();
        if let Some(existing) = self.get_agent(&id) {
            log::warn!("Agent '{}' already exists; keeping the registered instance", id);
            return existing;
        }

        let template = self.templates.get(&role);
        let config = template.instantiate(id.clone(), self.config.default_max_concurrent_tasks);
        let agent = self.build_agent(config);

        let agent = self.agents.entry(id.clone()).or_insert(agent).value().clone();
        log::info!("Created {} agent '{}'", role, id);

        record_quietly(
            self.memory.as_ref(),
            EventRecord::new(
                "agent_created",
                json!({
                    "agent_id": id,
                    "role": role,
                    "capabilities": template.capabilities.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
                    "tools": template.tools,
                }),
            )
            .with_description(format!("Created {} agent {}", role, id)),
        )
        .await;
        agent
    }

    fn build_agent(&self, config: AgentConfig) -> Arc<Agent> {
        let behavior = self.behaviors.build(&config.role);
        let settings = RoleSettings {
            decomposition_effort_threshold: self.config.decomposition_effort_threshold,
        };
        let mut agent = Agent::new(config, behavior, self.memory.clone())
            .with_bus(Arc::downgrade(&self.bus))
            .with_settings(settings);
        if let Some(tools) = &self.tools {
            agent = agent.with_tools(tools.clone());
        }
        Arc::new(agent)
    }

    /// One agent per built-in role, with default ids (`code-analyst-001`, ...).
    pub async fn create_default_agents(&self) -> Vec<Arc<Agent>> {
        let mut created = Vec::new();
        for role in AgentRole::builtin() {
            let id = default_agent_id(&role);
            created.push(self.create_agent(role, id).await);
        }
        created
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get_agent(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.get(id).map(|entry| entry.value().clone())
    }

    /// Agents with `role`, ordered by id.
    pub fn get_agents_by_role(&self, role: &AgentRole) -> Vec<Arc<Agent>> {
        let mut agents: Vec<Arc<Agent>> = self
            .agents
            .iter()
            .filter(|entry| &entry.value().role() == role)
            .map(|entry| entry.value().clone())
            .collect();
        agents.sort_by_key(|a| a.id());
        agents
    }

    /// Every agent, ordered by id.
    pub fn get_all_agents(&self) -> Vec<Arc<Agent>> {
        let mut agents: Vec<Arc<Agent>> =
            self.agents.iter().map(|entry| entry.value().clone()).collect();
        agents.sort_by_key(|a| a.id());
        agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    // -----------------------------------------------------------------------
    // Work
    // -----------------------------------------------------------------------

    /// Run a task on its assigned agent.
    pub async fn assign_task(&self, task: TaskAssignment) -> AgentResponse {
        match self.get_agent(&task.assigned_agent) {
            Some(agent) => agent.execute_task(task).await,
            None => {
                let err = AgentError::NotFound(task.assigned_agent.clone());
                log::warn!("{}", err);
                AgentResponse::failure(err.to_string())
            }
        }
    }

    /// Queue a message and drain unless a drain is already in progress.
    pub async fn route_message(&self, message: AgentMessage) {
        self.bus.route(message).await;
    }

    pub fn pending_messages(&self) -> usize {
        self.bus.pending()
    }

    /// Explicit flush of the message queue.
    pub async fn drain_messages(&self) -> usize {
        self.bus.drain().await
    }

    /// Periodic safety-net drain. Stops once the registry is dropped.
    pub fn start_queue_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let bus = Arc::downgrade(&self.bus);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(live) = bus.upgrade() else { break };
                let handled = live.drain().await;
                if handled > 0 {
                    log::debug!("Queue sweeper delivered {} messages", handled);
                }
            }
        })
    }

    /// Pick the best agent id for a task, or `None` when nobody qualifies.
    ///
    /// `context.exclude_agents` (array of ids) removes agents from the pool.
    pub fn find_best_agent_for_task(
        &self,
        task_type: &str,
        requirements: &[String],
        context: &Value,
    ) -> Option<String> {
        let excluded: Vec<&str> = context
            .get("exclude_agents")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let candidates: Vec<Candidate> = self
            .get_all_agents()
            .into_iter()
            .filter(|agent| !excluded.contains(&agent.id().as_str()))
            .map(|agent| Candidate {
                config: agent.config(),
                status: agent.status(),
                metrics: agent.metrics(),
            })
            .collect();

        let best = scoring::select_best(&candidates, task_type, requirements, self.config.min_success_rate)
            .map(|c| c.config.id.clone());
        match &best {
            Some(id) => log::debug!("Best agent for '{}': '{}'", task_type, id),
            None => log::debug!("No eligible agent for '{}'", task_type),
        }
        best
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    pub fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<(), AgentError> {
        let agent = self.get_agent(id).ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        log::info!("Agent '{}' status set to {}", id, status);
        agent.set_status(status);
        Ok(())
    }

    pub fn restore_metrics(&self, id: &str, metrics: AgentMetrics) -> Result<(), AgentError> {
        let agent = self.get_agent(id).ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        agent.restore_metrics(metrics);
        Ok(())
    }

    /// Replace an agent's configuration. The id and role behaviour are kept.
    pub fn reconfigure(&self, id: &str, config: AgentConfig) -> Result<(), AgentError> {
        let agent = self.get_agent(id).ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        if config.role != agent.role() {
            return Err(AgentError::RoleLogic(format!(
                "cannot change role of '{}' from {} to {}",
                id,
                agent.role(),
                config.role
            )));
        }
        agent.reconfigure(config);
        log::info!("Reconfigured agent '{}'", id);
        Ok(())
    }

    pub fn get_system_metrics(&self) -> SystemMetrics {
        let agents = self.get_all_agents();
        let mut by_status: BTreeMap<AgentStatus, usize> = BTreeMap::new();
        let mut total_tasks = 0;
        let mut total_collaborations = 0;
        let mut success_sum = 0.0;

        for agent in &agents {
            *by_status.entry(agent.status()).or_default() += 1;
            let metrics = agent.metrics();
            total_tasks += metrics.tasks_completed;
            total_collaborations += metrics.collaboration_count;
            success_sum += metrics.success_rate;
        }

        SystemMetrics {
            total_agents: agents.len(),
            agents_by_status: by_status,
            total_tasks_completed: total_tasks,
            average_success_rate: if agents.is_empty() { 0.0 } else { success_sum / agents.len() as f64 },
            total_collaborations,
            pending_messages: self.bus.pending(),
            delivered_messages: self.bus.delivered(),
            failed_deliveries: self.bus.failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::agents::behavior::test_support::{factory, Script, ScriptedBehavior};
    use crate::memory::InMemoryStore;
    use crate::types::{MessageType, Priority, TaskMetadata, BROADCAST_RECIPIENT};

    async fn default_registry() -> (AgentRegistry, Arc<InMemoryStore>) {
        let memory = InMemoryStore::shared();
        let registry = AgentRegistry::new(memory.clone());
        registry.create_default_agents().await;
        (registry, memory)
    }

    #[tokio::test]
    async fn test_default_agents_are_created() {
        let (registry, memory) = default_registry().await;
        assert_eq!(registry.len(), 6);
        assert!(registry.get_agent("code-analyst-001").is_some());
        assert_eq!(registry.get_agents_by_role(&AgentRole::SecurityAuditor).len(), 1);
        assert_eq!(memory.events_of_type("agent_created").len(), 6);
        assert_eq!(
            registry.get_agent("task-manager-001").unwrap().config().max_concurrent_tasks,
            5
        );
    }

    #[tokio::test]
    async fn test_create_agent_keeps_existing() {
        let (registry, _) = default_registry().await;
        let first = registry.get_agent("developer-001").unwrap();
        let again = registry.create_agent(AgentRole::Developer, "developer-001").await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.len(), 6);
    }

    #[tokio::test]
    async fn test_assign_task_unknown_agent() {
        let (registry, _) = default_registry().await;
        let task = TaskAssignment::new("t", "nobody", Priority::Low, TaskMetadata::new("analysis", ""));
        let resp = registry.assign_task(task).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Agent not found: nobody"));
    }

    #[tokio::test]
    async fn test_assign_task_runs_role_logic() {
        let (registry, _) = default_registry().await;
        let task = TaskAssignment::new(
            "t",
            "code-analyst-001",
            Priority::High,
            TaskMetadata::new("code_review", "").with_context(json!({"code": "fn ok() {}"})),
        );
        let resp = registry.assign_task(task).await;
        assert!(resp.success);
        assert_eq!(resp.result.unwrap()["quality_score"], 100);
        assert_eq!(registry.get_system_metrics().total_tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_custom_role_falls_back_to_task_manager() {
        let (registry, _) = default_registry().await;
        registry.create_agent(AgentRole::from("ux_designer"), "ux-001").await;
        let task = TaskAssignment::new("t", "ux-001", Priority::Low, TaskMetadata::new("security", ""));
        let resp = registry.assign_task(task).await;
        assert_eq!(resp.result.unwrap()["action"], "delegated");
        assert_eq!(resp.collaboration_needed, vec![AgentRole::SecurityAuditor]);
    }

    #[tokio::test]
    async fn test_registered_behavior_is_used() {
        let scripted = Arc::new(ScriptedBehavior::new(Script::Succeed(json!("custom"))));
        let mut table = BehaviorTable::builtin();
        table.register(AgentRole::from("ux_designer"), factory(scripted.clone()));

        let registry = AgentRegistry::new(InMemoryStore::shared()).with_behaviors(table);
        registry.create_agent(AgentRole::from("ux_designer"), "ux-001").await;
        let task = TaskAssignment::new("t", "ux-001", Priority::Low, TaskMetadata::new("ui", ""));
        assert!(registry.assign_task(task).await.success);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delegation_notifies_specialist() {
        let (registry, _) = default_registry().await;
        let task = TaskAssignment::new(
            "t",
            "task-manager-001",
            Priority::Medium,
            TaskMetadata::new("security_audit", "audit login"),
        );
        registry.assign_task(task).await;

        let auditor = registry.get_agent("security-auditor-001").unwrap();
        assert_eq!(auditor.metrics().collaboration_count, 1);
        assert_eq!(registry.pending_messages(), 0);
    }

    #[tokio::test]
    async fn test_request_message_runs_as_task() {
        let (registry, _) = default_registry().await;
        registry
            .route_message(AgentMessage::new(
                "task-manager-001",
                "code-analyst-001",
                MessageType::Request,
                json!({"task_type": "code_review", "context": {"code": "x.unwrap();"}}),
            ))
            .await;
        let analyst = registry.get_agent("code-analyst-001").unwrap();
        assert_eq!(analyst.metrics().collaboration_count, 1);
        assert_eq!(registry.get_system_metrics().delivered_messages, 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_but_sender() {
        let (registry, _) = default_registry().await;
        registry
            .route_message(AgentMessage::new(
                "memory-curator-001",
                BROADCAST_RECIPIENT,
                MessageType::Broadcast,
                json!({"event": "index_rebuilt"}),
            ))
            .await;
        let metrics = registry.get_system_metrics();
        assert_eq!(metrics.total_collaborations, 5);
        assert_eq!(
            registry.get_agent("memory-curator-001").unwrap().metrics().collaboration_count,
            0
        );
    }

    #[tokio::test]
    async fn test_sweeper_drains_queue() {
        let (registry, _) = default_registry().await;
        registry.bus.enqueue(AgentMessage::new(
            "x",
            "developer-001",
            MessageType::Notification,
            json!({}),
        ));
        let handle = registry.start_queue_sweeper(Duration::from_millis(10));
        for _ in 0..50 {
            if registry.pending_messages() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(registry.pending_messages(), 0);
    }

    #[tokio::test]
    async fn test_find_best_prefers_idle_agent() {
        let registry = AgentRegistry::new(InMemoryStore::shared());
        registry.create_agent(AgentRole::CodeAnalyst, "analyst-a").await;
        registry.create_agent(AgentRole::CodeAnalyst, "analyst-b").await;

        let restore = |id: &str, rate: f64| {
            registry
                .restore_metrics(id, AgentMetrics { success_rate: rate, ..AgentMetrics::default() })
                .unwrap();
        };
        restore("analyst-a", 0.9);
        restore("analyst-b", 0.95);
        registry.set_agent_status("analyst-a", AgentStatus::Busy).unwrap();

        let best = registry.find_best_agent_for_task("code_review", &[], &json!({}));
        assert_eq!(best.as_deref(), Some("analyst-b"));

        let excluded =
            registry.find_best_agent_for_task("code_review", &[], &json!({"exclude_agents": ["analyst-b"]}));
        assert_eq!(excluded.as_deref(), Some("analyst-a"));
    }

    #[tokio::test]
    async fn test_find_best_never_returns_ineligible_agents() {
        let registry = AgentRegistry::new(InMemoryStore::shared());
        registry.create_agent(AgentRole::CodeAnalyst, "low").await;
        registry.create_agent(AgentRole::CodeAnalyst, "down").await;
        registry.create_agent(AgentRole::CodeAnalyst, "gone").await;

        registry
            .restore_metrics("low", AgentMetrics { success_rate: 0.7, ..AgentMetrics::default() })
            .unwrap();
        registry.set_agent_status("down", AgentStatus::Error).unwrap();
        registry.set_agent_status("gone", AgentStatus::Offline).unwrap();

        assert_eq!(registry.find_best_agent_for_task("code_review", &[], &json!({})), None);
    }

    #[tokio::test]
    async fn test_admin_operations_on_unknown_agent() {
        let registry = AgentRegistry::new(InMemoryStore::shared());
        assert!(matches!(
            registry.set_agent_status("nope", AgentStatus::Offline),
            Err(AgentError::NotFound(_))
        ));
        assert!(registry.restore_metrics("nope", AgentMetrics::default()).is_err());
    }

    #[tokio::test]
    async fn test_reconfigure_rejects_role_change() {
        let (registry, _) = default_registry().await;
        let config = AgentConfig::new("code-analyst-001", AgentRole::Developer, "Dev");
        assert!(registry.reconfigure("code-analyst-001", config).is_err());

        let config = AgentConfig::new("code-analyst-001", AgentRole::CodeAnalyst, "Renamed")
            .with_max_concurrent_tasks(8);
        registry.reconfigure("code-analyst-001", config).unwrap();
        let agent = registry.get_agent("code-analyst-001").unwrap();
        assert_eq!(agent.config().max_concurrent_tasks, 8);
    }

    #[tokio::test]
    async fn test_system_metrics_counts_by_status() {
        let (registry, _) = default_registry().await;
        registry.set_agent_status("developer-001", AgentStatus::Offline).unwrap();
        let metrics = registry.get_system_metrics();
        assert_eq!(metrics.total_agents, 6);
        assert_eq!(metrics.agents_by_status.get(&AgentStatus::Idle), Some(&5));
        assert_eq!(metrics.agents_by_status.get(&AgentStatus::Offline), Some(&1));
        assert_eq!(metrics.average_success_rate, 1.0);
    }
}
