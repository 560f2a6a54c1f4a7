//! Core DTOs shared by agents, the registry and the orchestrator.
//!
//! ```text
//! AgentConfig ──► Agent ──► AgentStatus / AgentMetrics
//!                   ▲
//! TaskAssignment ───┘──► AgentResponse
//! AgentMessage ─────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Roles and capabilities
// ---------------------------------------------------------------------------

/// The specialization of an agent.
///
/// Unknown role names parse into [`AgentRole::Custom`] so templates and
/// requests can name roles this crate does not ship behaviour for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentRole {
    TaskManager,
    CodeAnalyst,
    SecurityAuditor,
    PerformanceOptimizer,
    MemoryCurator,
    Developer,
    Custom(String),
}

impl AgentRole {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskManager => "task_manager",
            Self::CodeAnalyst => "code_analyst",
            Self::SecurityAuditor => "security_auditor",
            Self::PerformanceOptimizer => "performance_optimizer",
            Self::MemoryCurator => "memory_curator",
            Self::Developer => "developer",
            Self::Custom(name) => name,
        }
    }

    /// All roles with a built-in template, in creation order.
    pub fn builtin() -> [AgentRole; 6] {
        [
            Self::TaskManager,
            Self::CodeAnalyst,
            Self::SecurityAuditor,
            Self::PerformanceOptimizer,
            Self::MemoryCurator,
            Self::Developer,
        ]
    }
}

impl From<&str> for AgentRole {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "task_manager" => Self::TaskManager,
            "code_analyst" => Self::CodeAnalyst,
            "security_auditor" => Self::SecurityAuditor,
            "performance_optimizer" => Self::PerformanceOptimizer,
            "memory_curator" => Self::MemoryCurator,
            "developer" => Self::Developer,
            _ => Self::Custom(s.to_string()),
        }
    }
}

impl From<String> for AgentRole {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<AgentRole> for String {
    fn from(role: AgentRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared (name, accepted-input-types) pair used for task matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name (e.g., "code_review").
    pub name: String,
    /// What the capability does.
    #[serde(default)]
    pub description: String,
    /// Task types / skill tags this capability accepts.
    #[serde(default)]
    pub input_types: Vec<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_types: input_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether this capability overlaps the task type or any requirement,
    /// either through its accepted input types or its name.
    pub fn accepts(&self, task_type: &str, requirements: &[String]) -> bool {
        let wanted = std::iter::once(task_type).chain(requirements.iter().map(String::as_str));
        let name = self.name.trim().to_lowercase();
        wanted
            .map(str::to_lowercase)
            .filter(|w| !w.is_empty())
            .any(|w| {
                self.input_types.iter().any(|t| t.eq_ignore_ascii_case(&w))
                    || (!name.is_empty() && (name.contains(&w) || w.contains(&name)))
            })
    }

    /// Whether the capability name textually matches one of the requirements.
    pub fn name_matches(&self, requirements: &[String]) -> bool {
        let name = self.name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        requirements.iter().map(|r| r.to_lowercase()).any(|r| {
            !r.is_empty() && (name.contains(&r) || r.contains(&name))
        })
    }
}

// ---------------------------------------------------------------------------
// Agent configuration, status, metrics
// ---------------------------------------------------------------------------

/// Identity and declared abilities of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub role: AgentRole,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// External tools this agent may invoke.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_true")]
    pub learning_enabled: bool,
}

fn default_max_concurrent() -> usize { 3 }
fn default_true() -> bool { true }

impl AgentConfig {
    pub fn new(id: impl Into<String>, role: AgentRole, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            name: name.into(),
            capabilities: Vec::new(),
            tools: Vec::new(),
            max_concurrent_tasks: default_max_concurrent(),
            learning_enabled: true,
        }
    }

    /// Builder: add a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Builder: set tool access.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Builder: set the concurrency limit (at least 1).
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// Current state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Busy,
    Error,
    Offline,
}

impl AgentStatus {
    /// Whether routing may pick an agent in this state.
    pub fn is_routable(&self) -> bool {
        !matches!(self, Self::Error | Self::Offline)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Running per-agent aggregate. No raw history is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    /// Cumulative average response time in milliseconds.
    pub average_response_time_ms: f64,
    /// Running average of task outcomes (1.0 before any task).
    pub success_rate: f64,
    pub collaboration_count: u64,
    pub uptime_secs: u64,
    pub last_activity: DateTime<Utc>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            average_response_time_ms: 0.0,
            success_rate: 1.0,
            collaboration_count: 0,
            uptime_secs: 0,
            last_activity: Utc::now(),
        }
    }
}

impl AgentMetrics {
    /// Fold one finished task into the running averages.
    pub fn record_task(&mut self, success: bool, duration_ms: f64) {
        self.tasks_completed += 1;
        let n = self.tasks_completed as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * (n - 1.0) + duration_ms) / n;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * (n - 1.0) + outcome) / n;
        self.last_activity = Utc::now();
    }

    pub fn record_collaboration(&mut self) {
        self.collaboration_count += 1;
        self.last_activity = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Priority label for requests and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric weight carried on a `TaskAssignment`.
    pub fn weight(&self) -> u8 {
        match self {
            Self::Low => 3,
            Self::Medium => 5,
            Self::High => 7,
            Self::Critical => 10,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// The metadata bag carried by every assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Task type (e.g., "code_review", "security_audit", "analysis").
    pub task_type: String,
    pub description: String,
    /// Caller-provided context object.
    #[serde(default)]
    pub context: Value,
    /// Response of the upstream role when chained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_result: Option<Value>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl TaskMetadata {
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            description: description.into(),
            context: Value::Null,
            previous_result: None,
            required_skills: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Builder: set the context object.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Builder: chain an upstream result.
    pub fn with_previous_result(mut self, previous: Value) -> Self {
        self.previous_result = Some(previous);
        self
    }

    pub fn with_required_skills(mut self, skills: Vec<String>) -> Self {
        self.required_skills = skills;
        self
    }

    /// Look up a string field in the context object.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// Look up a numeric field in the context object.
    pub fn context_f64(&self, key: &str) -> Option<f64> {
        self.context.get(key).and_then(Value::as_f64)
    }
}

/// A unit of work bound to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: String,
    /// Logical task id (shared by all assignments of one orchestration).
    pub task_id: String,
    pub assigned_agent: String,
    pub priority: u8,
    pub status: TaskStatus,
    pub metadata: TaskMetadata,
}

impl TaskAssignment {
    pub fn new(
        task_id: impl Into<String>,
        assigned_agent: impl Into<String>,
        priority: Priority,
        metadata: TaskMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            assigned_agent: assigned_agent.into(),
            priority: priority.weight(),
            status: TaskStatus::Pending,
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages and responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Request,
    Response,
    Notification,
    Broadcast,
}

/// Recipient id that addresses every registered agent.
pub const BROADCAST_RECIPIENT: &str = "*";

/// Inter-agent communication unit. Consumed exactly once by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub message_type: MessageType,
    pub payload: Value,
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        message_type: MessageType,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            message_type,
            payload,
            priority: Priority::Medium.weight(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority.weight();
        self
    }
}

/// Result of a task or a handled message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Roles needed for further collaboration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaboration_needed: Vec<AgentRole>,
    /// Human-readable improvement suggestions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl AgentResponse {
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Builder: name roles needed for follow-up work.
    pub fn with_collaboration(mut self, roles: Vec<AgentRole>) -> Self {
        self.collaboration_needed = roles;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_parsing_and_display() {
        assert_eq!(AgentRole::from("code_analyst"), AgentRole::CodeAnalyst);
        assert_eq!(AgentRole::from("Security-Auditor"), AgentRole::SecurityAuditor);
        assert_eq!(AgentRole::from("ux_designer"), AgentRole::Custom("ux_designer".into()));
        assert_eq!(AgentRole::MemoryCurator.to_string(), "memory_curator");
    }

    #[test]
    fn test_role_serializes_as_plain_string() {
        let v = serde_json::to_value(AgentRole::PerformanceOptimizer).unwrap();
        assert_eq!(v, json!("performance_optimizer"));
        let back: AgentRole = serde_json::from_value(json!("task_manager")).unwrap();
        assert_eq!(back, AgentRole::TaskManager);
    }

    #[test]
    fn test_capability_matching() {
        let cap = Capability::new("code_review", "Review code", &["code_review", "analysis"]);
        assert!(cap.accepts("analysis", &[]));
        assert!(cap.accepts("unrelated", &["code_review".into()]));
        assert!(cap.accepts("review", &[]), "name containment should match");
        assert!(!cap.accepts("database", &["deployment".into()]));

        assert!(cap.name_matches(&["review".into()]));
        assert!(!cap.name_matches(&["database".into()]));
        assert!(!cap.name_matches(&[]));
    }

    #[test]
    fn test_unnamed_capability_matches_only_input_types() {
        let cap = Capability::new("", "", &["analysis"]);
        assert!(!cap.accepts("database", &["deployment".into()]));
        assert!(!cap.name_matches(&["anything".into()]));
        assert!(cap.accepts("analysis", &[]));
    }

    #[test]
    fn test_priority_weights_and_order() {
        assert_eq!(Priority::Low.weight(), 3);
        assert_eq!(Priority::Medium.weight(), 5);
        assert_eq!(Priority::High.weight(), 7);
        assert_eq!(Priority::Critical.weight(), 10);
        assert!(Priority::Critical > Priority::High);
    }

    #[test]
    fn test_metrics_running_average() {
        let mut m = AgentMetrics::default();
        assert_eq!(m.success_rate, 1.0);

        m.record_task(true, 100.0);
        m.record_task(false, 300.0);
        m.record_task(true, 200.0);
        m.record_task(true, 400.0);

        assert_eq!(m.tasks_completed, 4);
        assert!((m.success_rate - 0.75).abs() < 1e-9);
        assert!((m.average_response_time_ms - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_task_assignment_priority_from_label() {
        let meta = TaskMetadata::new("code_review", "review auth module");
        let task = TaskAssignment::new("t-1", "code-analyst-001", Priority::High, meta);
        assert_eq!(task.priority, 7);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_metadata_context_lookup() {
        let meta = TaskMetadata::new("analysis", "x")
            .with_context(json!({"code": "fn main() {}", "estimated_effort": 9}));
        assert_eq!(meta.context_str("code"), Some("fn main() {}"));
        assert_eq!(meta.context_f64("estimated_effort"), Some(9.0));
        assert_eq!(meta.context_str("missing"), None);
    }

    #[test]
    fn test_response_builders_and_serialization() {
        let resp = AgentResponse::success(json!({"ok": true}))
            .with_collaboration(vec![AgentRole::CodeAnalyst]);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["collaboration_needed"], json!(["code_analyst"]));
        assert!(v.get("error").is_none());

        let fail = AgentResponse::failure("nope");
        assert!(!fail.success);
        assert_eq!(fail.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(serde_json::to_value(MessageType::Request).unwrap(), json!("REQUEST"));
        let msg = AgentMessage::new("a", "b", MessageType::Notification, json!({}))
            .with_priority(Priority::Critical);
        assert_eq!(msg.priority, 10);
    }
}
