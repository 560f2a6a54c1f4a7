//! Role templates: the base capabilities, tool access and concurrency an
//! agent of a given role is created with.
//!
//! The built-in table covers every shipped role. Extra or replacement
//! templates can be loaded from YAML:
//!
//! ```yaml
//! templates:
//!   - role: ux_designer
//!     name: UX Designer
//!     capabilities:
//!       - name: ui_review
//!         input_types: [frontend, ui_review]
//!     tools: [screenshot]
//!     max_concurrent_tasks: 2
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{AgentConfig, AgentRole, Capability};

/// Blueprint for agents of one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub role: AgentRole,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub tools: Vec<String>,
    /// `None` takes the engine-wide default.
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,
    #[serde(default = "default_true")]
    pub learning_enabled: bool,
}

fn default_true() -> bool { true }

impl AgentTemplate {
    pub fn new(role: AgentRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            capabilities: Vec::new(),
            tools: Vec::new(),
            max_concurrent_tasks: None,
            learning_enabled: true,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = Some(max);
        self
    }

    /// Template for a role nobody described: no capabilities, no tools.
    fn generic(role: &AgentRole) -> Self {
        let name = role
            .as_str()
            .split(['_', '-', ' '])
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(role.clone(), name)
    }

    /// Build an agent configuration from this template.
    pub fn instantiate(&self, id: impl Into<String>, default_max_concurrent: usize) -> AgentConfig {
        let mut config = AgentConfig::new(id, self.role.clone(), self.name.clone())
            .with_tools(self.tools.clone())
            .with_max_concurrent_tasks(self.max_concurrent_tasks.unwrap_or(default_max_concurrent));
        config.capabilities = self.capabilities.clone();
        config.learning_enabled = self.learning_enabled;
        config
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("template for '{}' has no name", self.role)));
        }
        if self.capabilities.iter().any(|c| c.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "template for '{}' has an unnamed capability",
                self.role
            )));
        }
        if self.max_concurrent_tasks == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "template for '{}' allows zero concurrent tasks",
                self.role
            )));
        }
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Default agent id for the first agent of a role, e.g. `code-analyst-001`.
pub fn default_agent_id(role: &AgentRole) -> String {
    format!("{}-001", role.as_str().replace('_', "-"))
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    templates: Vec<AgentTemplate>,
}

/// Role → template lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSet {
    templates: HashMap<AgentRole, AgentTemplate>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    pub fn empty() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Templates for every shipped role.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(
            AgentTemplate::new(AgentRole::TaskManager, "Task Manager")
                .with_capability(Capability::new(
                    "task_decomposition",
                    "Break down complex work into phases",
                    &["task_completion", "feature_development", "planning", "implementation"],
                ))
                .with_capability(Capability::new(
                    "delegation",
                    "Route work to specialists",
                    &["delegation", "coordination"],
                ))
                .with_max_concurrent_tasks(5),
        );
        set.insert(
            AgentTemplate::new(AgentRole::CodeAnalyst, "Code Analyst")
                .with_capability(Capability::new(
                    "code_review",
                    "Review code quality and maintainability",
                    &["code_review", "analysis", "review", "testing"],
                ))
                .with_capability(Capability::new(
                    "quality_analysis",
                    "Score code and suggest refactorings",
                    &["quality", "refactoring"],
                ))
                .with_tools(&["static_analysis"]),
        );
        set.insert(
            AgentTemplate::new(AgentRole::SecurityAuditor, "Security Auditor")
                .with_capability(Capability::new(
                    "security_audit",
                    "Find vulnerabilities and propose mitigations",
                    &["security_audit", "security", "vulnerability_scan", "auth"],
                ))
                .with_tools(&["static_analysis"])
                .with_max_concurrent_tasks(2),
        );
        set.insert(
            AgentTemplate::new(AgentRole::PerformanceOptimizer, "Performance Optimizer")
                .with_capability(Capability::new(
                    "performance_analysis",
                    "Locate bottlenecks and estimate gains",
                    &["system_optimization", "performance", "optimization", "profiling", "database"],
                ))
                .with_tools(&["profiler"])
                .with_max_concurrent_tasks(2),
        );
        set.insert(
            AgentTemplate::new(AgentRole::MemoryCurator, "Memory Curator")
                .with_capability(Capability::new(
                    "knowledge_organization",
                    "Organize project knowledge",
                    &["knowledge_organization", "documentation", "knowledge", "memory"],
                ))
                .with_capability(Capability::new(
                    "memory_optimization",
                    "Decay and archive stale memories",
                    &["memory_optimization", "optimize"],
                )),
        );
        set.insert(
            AgentTemplate::new(AgentRole::Developer, "Developer")
                .with_capability(Capability::new(
                    "implementation",
                    "Implement features and fixes",
                    &["implementation", "feature_development", "bug_fix", "api_design", "frontend"],
                ))
                .with_tools(&["file_ops"]),
        );
        set
    }

    /// Built-in templates overlaid with the ones from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut set = Self::builtin();
        set.merge_yaml(yaml)?;
        Ok(set)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Add or replace templates from a YAML document.
    pub fn merge_yaml(&mut self, yaml: &str) -> Result<usize, ConfigError> {
        let file: TemplateFile = serde_yaml::from_str(yaml)?;
        let count = file.templates.len();
        for template in file.templates {
            template.validate()?;
            self.insert(template);
        }
        Ok(count)
    }

    pub fn insert(&mut self, template: AgentTemplate) {
        self.templates.insert(template.role.clone(), template);
    }

    /// Template for `role`; roles without one get a bare generic template.
    pub fn get(&self, role: &AgentRole) -> AgentTemplate {
        self.templates.get(role).cloned().unwrap_or_else(|| AgentTemplate::generic(role))
    }

    pub fn contains(&self, role: &AgentRole) -> bool {
        self.templates.contains_key(role)
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        let mut roles: Vec<AgentRole> = self.templates.keys().cloned().collect();
        roles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        roles
    }
}
