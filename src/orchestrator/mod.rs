//! Orchestrator: turns a high-level request into a workflow across agents.
//!
//! ```text
//! request ─► Strategy ─► MultiAgentWorkflow ─► sequential | parallel | hybrid
//!                                                     │
//!              result ◄── learning records + recommendations
//! ```
//!
//! `orchestrate` never fails: planning errors, deadline expiry and panics all
//! come back as an `OrchestrationResult` with `success: false`.

pub mod classifier;
pub mod learning;
pub mod strategy;
pub mod types;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agents::Agent;
use crate::config::EngineConfig;
use crate::error::{panic_message, OrchestrationError};
use crate::memory::{record_quietly, EventRecord};
use crate::registry::{AgentRegistry, SystemMetrics};
use crate::types::{AgentResponse, AgentRole, TaskAssignment, TaskMetadata};

pub use classifier::{KeywordClassifier, RequestClassifier};
pub use strategy::Strategy;
pub use types::{
    AgentLearningRecord, CoordinationMode, ErrorHandling, LearningOutcome, MultiAgentWorkflow,
    OrchestrationRequest, OrchestrationResult,
};

/// Failure text for a dispatch cut off by the deadline or task timeout.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";
/// Failure text for a parallel branch that did not settle normally.
pub const PARALLEL_FAILED: &str = "parallel execution failed";

/// Registry metrics plus orchestrator-local counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorMetrics {
    #[serde(flatten)]
    pub registry: SystemMetrics,
    pub active_workflows: usize,
    pub cached_results: usize,
    pub total_orchestrations: u64,
    pub successful_orchestrations: u64,
}

struct CachedResult {
    result: OrchestrationResult,
    stored_at: Instant,
}

/// Removes a workflow from the active set on every exit path.
struct ActiveWorkflow<'a> {
    active: &'a DashMap<String, MultiAgentWorkflow>,
    id: String,
}

impl Drop for ActiveWorkflow<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

/// Per-role outcomes collected while a workflow runs.
#[derive(Default)]
struct Execution {
    results: BTreeMap<String, AgentResponse>,
    agent_ids: BTreeMap<String, String>,
    assigned: Vec<String>,
}

impl Execution {
    fn record(&mut self, role: &AgentRole, agent_id: Option<String>, response: AgentResponse) {
        if let Some(id) = agent_id {
            if !self.assigned.contains(&id) {
                self.assigned.push(id.clone());
            }
            self.agent_ids.insert(role.as_str().to_string(), id);
        }
        self.results.insert(role.as_str().to_string(), response);
    }
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    classifier: Arc<dyn RequestClassifier>,
    config: EngineConfig,
    active: DashMap<String, MultiAgentWorkflow>,
    results: DashMap<String, CachedResult>,
    total: AtomicU64,
    succeeded: AtomicU64,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("active_workflows", &self.active.len())
            .field("cached_results", &self.results.len())
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator over `registry`, sharing its configuration.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        let config = registry.config().clone();
        Self {
            registry,
            classifier: Arc::new(KeywordClassifier::new()),
            config,
            active: DashMap::new(),
            results: DashMap::new(),
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
        }
    }

    /// Builder: replace the free-text classifier used by `smart_route`.
    pub fn with_classifier(mut self, classifier: Arc<dyn RequestClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Plan and execute `request`.
    pub async fn orchestrate(&self, request: OrchestrationRequest) -> OrchestrationResult {
        let started = Instant::now();
        let id = Uuid::new_v4().to_string();
        let strategy = Strategy::for_request_type(&request.request_type);
        let workflow = strategy.plan(&request);
        log::info!(
            "Orchestration {} ('{}'): strategy {} with {} coordination",
            id, request.request_type, strategy, workflow.coordination,
        );

        self.active.insert(workflow.id.clone(), workflow.clone());
        let _active = ActiveWorkflow { active: &self.active, id: workflow.id.clone() };

        let outcome = AssertUnwindSafe(self.execute_workflow(&id, &request, &workflow))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(OrchestrationError::Panicked(panic_message(payload.as_ref()))));

        let result = match outcome {
            Ok(execution) => self.summarize(id, workflow, execution, started).await,
            Err(err) => {
                log::error!("Orchestration {} failed: {}", id, err);
                failed_result(id, Some(workflow), err, started)
            }
        };

        self.total.fetch_add(1, Ordering::Relaxed);
        if result.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        log::info!(
            "Orchestration {} finished in {}ms (success: {}, roles: {})",
            result.id, result.duration_ms, result.success, result.results.len(),
        );
        self.sweep_results();
        self.results.insert(
            result.id.clone(),
            CachedResult { result: result.clone(), stored_at: Instant::now() },
        );
        result
    }

    /// Classify a free-text request and orchestrate it.
    pub async fn smart_route(&self, description: &str, context: Value) -> OrchestrationResult {
        let request_type = self.classifier.request_type(description);
        let priority = self.classifier.priority(description);
        let skills = self.classifier.required_skills(description);
        log::info!(
            "Smart route: '{}' -> type {}, priority {}, skills {:?}",
            description, request_type, priority, skills,
        );

        let request = OrchestrationRequest::new(request_type, description)
            .with_priority(priority)
            .with_context(context)
            .with_required_skills(skills);
        self.orchestrate(request).await
    }

    // -----------------------------------------------------------------------
    // Workflow execution
    // -----------------------------------------------------------------------

    async fn execute_workflow(
        &self,
        orchestration_id: &str,
        request: &OrchestrationRequest,
        workflow: &MultiAgentWorkflow,
    ) -> Result<Execution, OrchestrationError> {
        if workflow.agents.is_empty() {
            return Err(OrchestrationError::EmptyWorkflow(workflow.name.clone()));
        }
        if !workflow.includes(&workflow.entry_point) {
            return Err(OrchestrationError::UnknownEntryPoint(workflow.entry_point.to_string()));
        }
        if request.deadline.is_some_and(|d| d <= Utc::now()) {
            return Err(OrchestrationError::Deadline);
        }

        let mut execution = Execution::default();
        match workflow.coordination {
            CoordinationMode::Sequential => {
                self.run_sequential(orchestration_id, request, workflow, &mut execution).await
            }
            CoordinationMode::Parallel => {
                self.run_parallel(orchestration_id, request, workflow, &mut execution).await
            }
            CoordinationMode::Hybrid => {
                self.run_hybrid(orchestration_id, request, workflow, &mut execution).await
            }
        }
        Ok(execution)
    }

    async fn run_sequential(
        &self,
        orchestration_id: &str,
        request: &OrchestrationRequest,
        workflow: &MultiAgentWorkflow,
        execution: &mut Execution,
    ) {
        let mut previous: Option<Value> = None;
        for role in &workflow.agents {
            let (agent_id, response) =
                self.dispatch(orchestration_id, request, role, previous.take()).await;
            let failed = !response.success;
            previous = Some(serde_json::to_value(&response).unwrap_or_default());
            execution.record(role, agent_id, response);

            if failed && workflow.error_handling == ErrorHandling::Escalate {
                log::warn!("Role {} failed; escalating and stopping {}", role, workflow.name);
                break;
            }
        }
    }

    async fn run_parallel(
        &self,
        orchestration_id: &str,
        request: &OrchestrationRequest,
        workflow: &MultiAgentWorkflow,
        execution: &mut Execution,
    ) {
        let branches = workflow.agents.iter().map(|role| {
            AssertUnwindSafe(self.dispatch(orchestration_id, request, role, None)).catch_unwind()
        });
        let settled = join_all(branches).await;

        for (role, outcome) in workflow.agents.iter().zip(settled) {
            match outcome {
                Ok((agent_id, response)) => execution.record(role, agent_id, response),
                Err(payload) => {
                    log::error!(
                        "Parallel branch for {} panicked: {}",
                        role,
                        panic_message(payload.as_ref())
                    );
                    execution.record(role, None, AgentResponse::failure(PARALLEL_FAILED));
                }
            }
        }
    }

    async fn run_hybrid(
        &self,
        orchestration_id: &str,
        request: &OrchestrationRequest,
        workflow: &MultiAgentWorkflow,
        execution: &mut Execution,
    ) {
        let entry = &workflow.entry_point;
        let (agent_id, entry_response) = self.dispatch(orchestration_id, request, entry, None).await;
        let succeeded = entry_response.success;
        let mut follow_ups: Vec<AgentRole> = Vec::new();
        for role in &entry_response.collaboration_needed {
            if role != entry && workflow.includes(role) && !follow_ups.contains(role) {
                follow_ups.push(role.clone());
            }
        }
        let entry_value = serde_json::to_value(&entry_response).unwrap_or_default();
        execution.record(entry, agent_id, entry_response);

        if !succeeded || follow_ups.is_empty() {
            return;
        }
        log::debug!("Hybrid fan-out from {} to {:?}", entry, follow_ups);

        let dispatches = follow_ups.iter().map(|role| {
            AssertUnwindSafe(self.dispatch(orchestration_id, request, role, Some(entry_value.clone())))
                .catch_unwind()
        });
        let settled = join_all(dispatches).await;
        for (role, outcome) in follow_ups.iter().zip(settled) {
            match outcome {
                Ok((agent_id, response)) => execution.record(role, agent_id, response),
                Err(_) => execution.record(role, None, AgentResponse::failure(PARALLEL_FAILED)),
            }
        }
    }

    /// Routable agent of `role` with the fewest in-flight tasks.
    fn agent_for_role(&self, role: &AgentRole) -> Option<Arc<Agent>> {
        self.registry
            .get_agents_by_role(role)
            .into_iter()
            .filter(|agent| agent.status().is_routable())
            .min_by_key(|agent| agent.in_flight())
    }

    /// Remaining time budget for one dispatch, if any bound applies.
    fn dispatch_budget(&self, request: &OrchestrationRequest) -> Option<Duration> {
        let remaining = request
            .deadline
            .map(|d| (d - Utc::now()).to_std().unwrap_or(Duration::ZERO));
        match (remaining, self.config.task_timeout()) {
            (Some(r), Some(t)) => Some(r.min(t)),
            (r, t) => r.or(t),
        }
    }

    /// Assign one task to the agent serving `role`.
    async fn dispatch(
        &self,
        orchestration_id: &str,
        request: &OrchestrationRequest,
        role: &AgentRole,
        previous: Option<Value>,
    ) -> (Option<String>, AgentResponse) {
        let Some(agent) = self.agent_for_role(role) else {
            let err = OrchestrationError::NoAgentForRole(role.to_string());
            log::warn!("{}", err);
            return (None, AgentResponse::failure(err.to_string()));
        };
        let agent_id = agent.id();

        let mut metadata = TaskMetadata::new(request.request_type.clone(), request.description.clone())
            .with_context(request.context.clone())
            .with_required_skills(request.required_skills.clone());
        metadata.constraints = request.constraints.clone();
        if let Some(prev) = previous {
            metadata = metadata.with_previous_result(prev);
        }
        let task = TaskAssignment::new(orchestration_id, agent_id.clone(), request.priority, metadata);

        let response = match self.dispatch_budget(request) {
            None => self.registry.assign_task(task).await,
            Some(budget) if budget.is_zero() => AgentResponse::failure(DEADLINE_EXCEEDED),
            Some(budget) => match tokio::time::timeout(budget, self.registry.assign_task(task)).await {
                Ok(response) => response,
                Err(_) => {
                    log::warn!("Agent '{}' ({}) exceeded its {:?} budget", agent_id, role, budget);
                    AgentResponse::failure(DEADLINE_EXCEEDED)
                }
            },
        };
        (Some(agent_id), response)
    }

    // -----------------------------------------------------------------------
    // Aggregation
    // -----------------------------------------------------------------------

    async fn summarize(
        &self,
        id: String,
        workflow: MultiAgentWorkflow,
        execution: Execution,
        started: Instant,
    ) -> OrchestrationResult {
        let learning_records =
            learning::learning_records(&workflow, &execution.results, &execution.agent_ids);
        let recommendations = learning::recommendations(&execution.results);
        let success = !execution.results.is_empty() && execution.results.values().all(|r| r.success);

        if self.config.learning_enabled {
            let memory = self.registry.memory();
            for record in &learning_records {
                record_quietly(
                    memory.as_ref(),
                    EventRecord::new(
                        "learning_record",
                        serde_json::to_value(record).unwrap_or_else(|_| json!({})),
                    )
                    .with_description(format!("{} in {}", record.role, record.scenario))
                    .with_task_id(id.clone()),
                )
                .await;
            }
        }

        OrchestrationResult {
            id,
            success,
            assigned_agents: execution.assigned,
            workflow: Some(workflow),
            results: execution.results,
            duration_ms: started.elapsed().as_millis() as u64,
            learning_records,
            recommendations,
            error: None,
            completed_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // State and maintenance
    // -----------------------------------------------------------------------

    pub fn get_result(&self, id: &str) -> Option<OrchestrationResult> {
        self.results.get(id).map(|entry| entry.result.clone())
    }

    /// Workflows currently executing.
    pub fn active_workflows(&self) -> Vec<MultiAgentWorkflow> {
        self.active.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Drop cached results older than the retention window.
    pub fn sweep_results(&self) -> usize {
        let retention = self.config.result_retention();
        let before = self.results.len();
        self.results.retain(|_, cached| cached.stored_at.elapsed() < retention);
        let removed = before.saturating_sub(self.results.len());
        if removed > 0 {
            log::debug!("Swept {} cached orchestration results", removed);
        }
        removed
    }

    /// Result sweep every `sweep_interval` and message-queue drain every
    /// `queue_drain_interval`. Stops once the orchestrator is dropped.
    pub fn start_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let this: Weak<Self> = Arc::downgrade(self);
        let sweep_period = self.config.sweep_interval();
        let drain_period = self.config.queue_drain_interval();
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval_at(
                tokio::time::Instant::now() + sweep_period,
                sweep_period,
            );
            let mut drain = tokio::time::interval(drain_period);
            sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            drain.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let sweep_due = tokio::select! {
                    _ = sweep.tick() => true,
                    _ = drain.tick() => false,
                };
                let Some(orchestrator) = this.upgrade() else { break };
                if sweep_due {
                    orchestrator.sweep_results();
                } else {
                    orchestrator.registry.drain_messages().await;
                }
            }
        })
    }

    pub fn get_system_metrics(&self) -> OrchestratorMetrics {
        OrchestratorMetrics {
            registry: self.registry.get_system_metrics(),
            active_workflows: self.active.len(),
            cached_results: self.results.len(),
            total_orchestrations: self.total.load(Ordering::Relaxed),
            successful_orchestrations: self.succeeded.load(Ordering::Relaxed),
        }
    }
}

fn failed_result(
    id: String,
    workflow: Option<MultiAgentWorkflow>,
    err: OrchestrationError,
    started: Instant,
) -> OrchestrationResult {
    OrchestrationResult {
        id,
        success: false,
        assigned_agents: Vec::new(),
        workflow,
        results: BTreeMap::new(),
        duration_ms: started.elapsed().as_millis() as u64,
        learning_records: Vec::new(),
        recommendations: learning::GENERIC_RECOVERY.iter().map(|s| s.to_string()).collect(),
        error: Some(err.to_string()),
        completed_at: Utc::now(),
    }
}
