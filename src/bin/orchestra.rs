//! Command-line front end: routes one free-text request through the default
//! agent roster and prints the orchestration result as JSON.
//!
//! # Environment Variables
//!
//! - `ORCHESTRA_CONFIG`: YAML engine config (optional; `ORCHESTRA_*` overrides apply on top)
//! - `ORCHESTRA_TEMPLATES`: YAML agent templates merged over the built-in set (optional)
//! - `ORCHESTRA_CONTEXT`: JSON object passed as request context (optional)
//! - `RUST_LOG`: log filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin orchestra -- "please review the login module"
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use agent_orchestra::{AgentRegistry, EngineConfig, InMemoryStore, Orchestrator, TemplateSet};

fn load_config() -> Result<EngineConfig> {
    let mut config = match std::env::var("ORCHESTRA_CONFIG") {
        Ok(path) => EngineConfig::from_yaml_file(&path)
            .with_context(|| format!("loading engine config from {}", path))?,
        Err(_) => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn load_templates() -> Result<TemplateSet> {
    let mut templates = TemplateSet::builtin();
    if let Ok(path) = std::env::var("ORCHESTRA_TEMPLATES") {
        let yaml = std::fs::read_to_string(&path)
            .with_context(|| format!("reading agent templates from {}", path))?;
        let merged = templates.merge_yaml(&yaml)?;
        log::info!("Merged {} agent templates from {}", merged, path);
    }
    Ok(templates)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let description = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if description.trim().is_empty() {
        bail!("usage: orchestra <request description>");
    }
    let context = match std::env::var("ORCHESTRA_CONTEXT") {
        Ok(raw) => serde_json::from_str(&raw).context("ORCHESTRA_CONTEXT is not valid JSON")?,
        Err(_) => serde_json::json!({}),
    };

    let registry = AgentRegistry::new(InMemoryStore::shared())
        .with_config(load_config()?)
        .with_templates(load_templates()?);
    let agents = registry.create_default_agents().await;
    log::info!("Started {} agents", agents.len());

    let orchestrator = Arc::new(Orchestrator::new(Arc::new(registry)));
    let maintenance = orchestrator.start_maintenance();

    let result = orchestrator.smart_route(&description, context).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    log::debug!(
        "Metrics: {}",
        serde_json::to_string(&orchestrator.get_system_metrics())?
    );

    maintenance.abort();
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
