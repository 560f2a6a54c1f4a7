//! Performance optimizer: spots common hotspots in `context.code`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::agents::behavior::{AgentContext, RoleBehavior};
use crate::error::AgentError;
use crate::types::{AgentResponse, TaskAssignment};

use super::code_analyst::{Finding, Severity};
use super::{source_of, trace_task};

static LOOP_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(for|while|loop)\b").unwrap());
static CLONE_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(clone|to_owned|to_vec)\(\)").unwrap());
static SELECT_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bselect\s+\*").unwrap());
static ASYNC_FN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\basync\s+(fn|move\s*\{|\{)").unwrap());
static BLOCKING_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(std::)?thread::sleep|std::fs::|\.blocking_(send|recv|lock)\(|reqwest::blocking").unwrap()
});

/// Response times above this (ms) are reported as a bottleneck.
const SLOW_RESPONSE_MS: f64 = 1000.0;
const MAX_IMPROVEMENT: u32 = 80;

fn finding(kind: &str, severity: Severity, line: Option<usize>, message: String) -> Finding {
    Finding { kind: kind.to_string(), severity, line, message }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Line-based hotspot scan. Block structure is inferred from indentation.
fn scan(code: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut loops: Vec<usize> = Vec::new();
    let mut async_scope: Option<usize> = None;

    for (idx, line) in code.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let n = idx + 1;
        let indent = indent_of(line);

        // Anything at or left of a loop head closes that loop.
        while loops.last().is_some_and(|&open| open >= indent) {
            loops.pop();
        }
        if async_scope.is_some_and(|open| indent <= open) {
            async_scope = None;
        }

        if LOOP_HEAD.is_match(line) {
            if !loops.is_empty() {
                findings.push(finding(
                    "nested_loop",
                    Severity::High,
                    Some(n),
                    format!("Nested loop at depth {}", loops.len() + 1),
                ));
            }
            loops.push(indent);
        } else if !loops.is_empty() && CLONE_CALL.is_match(line) {
            findings.push(finding("clone_in_loop", Severity::Medium, Some(n), "Allocation inside a loop".into()));
        }

        if SELECT_STAR.is_match(line) {
            findings.push(finding("select_star", Severity::Medium, Some(n), "Query selects every column".into()));
        }
        if async_scope.is_some() && BLOCKING_CALL.is_match(line) {
            findings.push(finding(
                "blocking_in_async",
                Severity::High,
                Some(n),
                "Blocking call inside async code".into(),
            ));
        }
        if async_scope.is_none() && ASYNC_FN.is_match(line) {
            async_scope = Some(indent);
        }
    }
    findings
}

fn recommendation(kind: &str) -> &'static str {
    match kind {
        "nested_loop" => "Replace nested loops with a lookup map or a single pass",
        "clone_in_loop" => "Hoist allocations out of loops or borrow instead of cloning",
        "select_star" => "Select only the needed columns and add covering indexes",
        "blocking_in_async" => "Move blocking work to spawn_blocking or use async APIs",
        "slow_response" => "Profile the slow path and add caching where results are reused",
        _ => "Profile the reported hotspot",
    }
}

fn improvement_weight(kind: &str) -> u32 {
    match kind {
        "nested_loop" => 25,
        "blocking_in_async" => 20,
        "select_star" => 15,
        _ => 10,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceOptimizerRole;

impl PerformanceOptimizerRole {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoleBehavior for PerformanceOptimizerRole {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        task: &TaskAssignment,
    ) -> Result<AgentResponse, AgentError> {
        trace_task(ctx, task);
        let mut bottlenecks = scan(source_of(task).unwrap_or_default());

        if let Some(ms) = task.metadata.context_f64("average_response_time_ms") {
            if ms > SLOW_RESPONSE_MS {
                bottlenecks.push(finding(
                    "slow_response",
                    Severity::Medium,
                    None,
                    format!("Average response time {:.0}ms", ms),
                ));
            }
        }

        let mut recommendations: Vec<String> = Vec::new();
        let mut improvement = 0u32;
        for b in &bottlenecks {
            let rec = recommendation(&b.kind);
            if !recommendations.iter().any(|r| r == rec) {
                recommendations.push(rec.to_string());
                improvement += improvement_weight(&b.kind);
            }
        }
        let improvement = improvement.min(MAX_IMPROVEMENT);

        Ok(AgentResponse::success(json!({
            "analysis": "performance",
            "bottlenecks": bottlenecks,
            "recommendations": recommendations,
            "estimated_improvement": format!("{}%", improvement),
        }))
        .with_suggestions(recommendations))
    }
}
