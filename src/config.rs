//! Engine configuration.
//!
//! Loaded from YAML (every field optional) and then adjusted from
//! `ORCHESTRA_*` environment variables:
//!
//! - `ORCHESTRA_RESULT_RETENTION_SECS`
//! - `ORCHESTRA_SWEEP_INTERVAL_SECS`
//! - `ORCHESTRA_QUEUE_DRAIN_INTERVAL_MS`
//! - `ORCHESTRA_TASK_TIMEOUT_MS` (`0` disables the timeout)
//! - `ORCHESTRA_LEARNING_ENABLED` (`true`/`false`/`1`/`0`)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for the registry and orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long finished orchestration results stay in the cache.
    #[serde(default = "default_retention")]
    pub result_retention_secs: u64,
    /// Period of the result-cache sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Period of the safety-net message queue drain.
    #[serde(default = "default_drain_interval")]
    pub queue_drain_interval_ms: u64,
    /// Agents at or below this success rate are never selected by routing.
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    /// Estimated effort above which the task manager decomposes a task.
    #[serde(default = "default_effort_threshold")]
    pub decomposition_effort_threshold: f64,
    /// Concurrency limit for agents created from templates.
    #[serde(default = "default_max_concurrent")]
    pub default_max_concurrent_tasks: usize,
    /// Per-dispatch timeout. `None` waits indefinitely.
    #[serde(default)]
    pub default_task_timeout_ms: Option<u64>,
    /// Whether learning records are forwarded to the memory store.
    #[serde(default = "default_true")]
    pub learning_enabled: bool,
}

fn default_retention() -> u64 { 3600 }
fn default_sweep_interval() -> u64 { 300 }
fn default_drain_interval() -> u64 { 1000 }
fn default_min_success_rate() -> f64 { 0.7 }
fn default_effort_threshold() -> f64 { 8.0 }
fn default_max_concurrent() -> usize { 3 }
fn default_true() -> bool { true }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
            queue_drain_interval_ms: default_drain_interval(),
            min_success_rate: default_min_success_rate(),
            decomposition_effort_threshold: default_effort_threshold(),
            default_max_concurrent_tasks: default_max_concurrent(),
            default_task_timeout_ms: None,
            learning_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Defaults adjusted by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `ORCHESTRA_*` overrides on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORCHESTRA_RESULT_RETENTION_SECS") {
            self.result_retention_secs = parse_num("ORCHESTRA_RESULT_RETENTION_SECS", &v)?;
        }
        if let Some(v) = lookup("ORCHESTRA_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_num("ORCHESTRA_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("ORCHESTRA_QUEUE_DRAIN_INTERVAL_MS") {
            self.queue_drain_interval_ms = parse_num("ORCHESTRA_QUEUE_DRAIN_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("ORCHESTRA_TASK_TIMEOUT_MS") {
            let ms: u64 = parse_num("ORCHESTRA_TASK_TIMEOUT_MS", &v)?;
            self.default_task_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(v) = lookup("ORCHESTRA_LEARNING_ENABLED") {
            self.learning_enabled = match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "ORCHESTRA_LEARNING_ENABLED must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }
        self.validate()
    }

    /// Reject values that would make routing or sweeping meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(ConfigError::Invalid(format!(
                "min_success_rate must be within [0, 1], got {}",
                self.min_success_rate
            )));
        }
        if self.default_max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "default_max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.sweep_interval_secs == 0 || self.queue_drain_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        Ok(())
    }

    pub fn result_retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn queue_drain_interval(&self) -> Duration {
        Duration::from_millis(self.queue_drain_interval_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.default_task_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a number: '{}'", key, value)))
}
