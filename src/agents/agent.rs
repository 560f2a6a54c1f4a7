//! The agent runtime shared by every role.
//!
//! An [`Agent`] owns its configuration, status and metrics, and wraps a
//! [`RoleBehavior`] with the bookkeeping every role needs: the concurrency
//! limit, status transitions, running metrics, observability events and the
//! conversion of role errors and panics into failed responses.

use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Instant;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use crate::error::{panic_message, AgentError};
use crate::memory::{record_quietly, EventRecord, MemoryStore};
use crate::registry::bus::MessageBus;
use crate::tools::ToolExecutor;
use crate::types::{
    AgentConfig, AgentMessage, AgentMetrics, AgentResponse, AgentRole, AgentStatus, MessageType,
    TaskAssignment, TaskStatus,
};

use super::behavior::{AgentContext, RoleBehavior, RoleSettings};

/// Suggestions attached to every failure raised by role logic.
pub const REMEDIATION_SUGGESTIONS: [&str; 2] =
    ["Retry with different parameters", "Escalate to human operator"];

#[derive(Debug, Default)]
struct AgentState {
    status: AgentStatus,
    active_tasks: HashSet<String>,
    metrics: AgentMetrics,
}

/// A logical worker with a fixed role and bounded concurrency.
pub struct Agent {
    config: RwLock<AgentConfig>,
    behavior: Arc<dyn RoleBehavior>,
    state: Mutex<AgentState>,
    started_at: Instant,
    memory: Arc<dyn MemoryStore>,
    tools: Option<Arc<dyn ToolExecutor>>,
    bus: Weak<MessageBus>,
    settings: RoleSettings,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config.read();
        f.debug_struct("Agent")
            .field("id", &config.id)
            .field("role", &config.role)
            .field("status", &self.status())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Releases a task slot when dropped, on every exit path including
/// cancellation of the surrounding future. A task cancelled before it
/// finished counts as a failure.
struct TaskSlot<'a> {
    agent: &'a Agent,
    task_id: String,
    claimed_at: Instant,
    finished: bool,
}

impl Drop for TaskSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.agent.state.lock();
        if !self.finished {
            let duration_ms = self.claimed_at.elapsed().as_secs_f64() * 1000.0;
            state.metrics.record_task(false, duration_ms);
            log::warn!("Task '{}' was cancelled before completion", self.task_id);
        }
        state.active_tasks.remove(&self.task_id);
        state.status = if state.active_tasks.is_empty() {
            AgentStatus::Idle
        } else {
            AgentStatus::Busy
        };
    }
}

impl Agent {
    pub fn new(config: AgentConfig, behavior: Arc<dyn RoleBehavior>, memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            config: RwLock::new(config),
            behavior,
            state: Mutex::new(AgentState::default()),
            started_at: Instant::now(),
            memory,
            tools: None,
            bus: Weak::new(),
            settings: RoleSettings::default(),
        }
    }

    /// Builder: attach a tool executor.
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Builder: attach the registry's message bus.
    pub fn with_bus(mut self, bus: Weak<MessageBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_settings(mut self, settings: RoleSettings) -> Self {
        self.settings = settings;
        self
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn id(&self) -> String {
        self.config.read().id.clone()
    }

    pub fn role(&self) -> AgentRole {
        self.config.read().role.clone()
    }

    pub fn config(&self) -> AgentConfig {
        self.config.read().clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.state.lock().status
    }

    /// Metrics snapshot with uptime filled in.
    pub fn metrics(&self) -> AgentMetrics {
        let mut metrics = self.state.lock().metrics.clone();
        metrics.uptime_secs = self.started_at.elapsed().as_secs();
        metrics
    }

    /// Number of tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.state.lock().active_tasks.len()
    }

    // -----------------------------------------------------------------------
    // External control
    // -----------------------------------------------------------------------

    /// Force a status (e.g. `Error` or `Offline` from a health check).
    pub fn set_status(&self, status: AgentStatus) {
        self.state.lock().status = status;
    }

    /// Replace the running metrics, e.g. when restoring from a snapshot.
    pub fn restore_metrics(&self, metrics: AgentMetrics) {
        self.state.lock().metrics = metrics;
    }

    /// Replace the configuration. The agent id cannot change.
    pub fn reconfigure(&self, mut config: AgentConfig) {
        let mut current = self.config.write();
        config.id = current.id.clone();
        config.max_concurrent_tasks = config.max_concurrent_tasks.max(1);
        *current = config;
    }

    fn context(&self) -> AgentContext {
        AgentContext {
            config: self.config(),
            memory: self.memory.clone(),
            tools: self.tools.clone(),
            bus: self.bus.clone(),
            settings: self.settings,
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute a task through the role behaviour.
    ///
    /// Never fails: capacity errors, role errors and role panics all come
    /// back as `success: false` responses.
    pub async fn execute_task(&self, mut task: TaskAssignment) -> AgentResponse {
        let (agent_id, max) = {
            let config = self.config.read();
            (config.id.clone(), config.max_concurrent_tasks)
        };

        {
            let mut state = self.state.lock();
            if state.active_tasks.len() >= max {
                let err = AgentError::Capacity { agent_id: agent_id.clone(), max };
                log::warn!("{}", err);
                return AgentResponse::failure(err.to_string());
            }
            state.active_tasks.insert(task.id.clone());
            state.status = AgentStatus::Busy;
        }
        let mut slot = TaskSlot {
            agent: self,
            task_id: task.id.clone(),
            claimed_at: Instant::now(),
            finished: false,
        };

        task.status = TaskStatus::Running;
        log::debug!("Agent '{}' started task '{}' ({})", agent_id, task.id, task.metadata.task_type);
        record_quietly(
            self.memory.as_ref(),
            EventRecord::new(
                "task_started",
                json!({
                    "agent_id": agent_id,
                    "assignment_id": task.id,
                    "task_type": task.metadata.task_type,
                    "priority": task.priority,
                }),
            )
            .with_description(format!("Agent {} started task", agent_id))
            .with_task_id(task.task_id.clone()),
        )
        .await;

        let ctx = self.context();
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.behavior.process_task(&ctx, &task))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                log::warn!("Agent '{}' failed task '{}': {}", agent_id, task.id, err);
                remediable_failure(err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Agent '{}' panicked on task '{}': {}", agent_id, task.id, message);
                remediable_failure(format!("Role logic panicked: {}", message))
            }
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.state.lock().metrics.record_task(response.success, duration_ms);
        slot.finished = true;
        task.status = if response.success { TaskStatus::Completed } else { TaskStatus::Failed };

        record_quietly(
            self.memory.as_ref(),
            EventRecord::new(
                "task_completed",
                json!({
                    "agent_id": agent_id,
                    "assignment_id": task.id,
                    "status": task.status,
                    "success": response.success,
                    "duration_ms": duration_ms,
                    "error": response.error,
                }),
            )
            .with_description(format!("Agent {} finished task", agent_id))
            .with_task_id(task.task_id.clone()),
        )
        .await;

        drop(slot);
        log::debug!(
            "Agent '{}' finished task '{}' in {:.1}ms (success: {})",
            agent_id, task.id, duration_ms, response.success,
        );
        response
    }

    /// Handle an inter-agent message through the role behaviour.
    pub async fn handle_message(&self, message: AgentMessage) -> AgentResponse {
        self.state.lock().metrics.record_collaboration();

        let ctx = self.context();
        let outcome = AssertUnwindSafe(self.behavior.handle_message(&ctx, &message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => AgentResponse::failure(err.to_string()),
            Err(payload) => AgentResponse::failure(format!(
                "Message handler panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    /// Send a message to another agent through the registry.
    pub async fn send_message(&self, to_agent: &str, message_type: MessageType, payload: Value) {
        self.context().send_message(to_agent, message_type, payload).await;
    }
}

fn remediable_failure(error: String) -> AgentResponse {
    AgentResponse::failure(error)
        .with_suggestions(REMEDIATION_SUGGESTIONS.iter().map(|s| s.to_string()).collect())
}
