//! Code analyst and security auditor.
//!
//! Both work over the source string in `context.code`. A review scores code
//! quality by subtracting severity-weighted penalties from 100; an audit
//! lists vulnerabilities with a coarse risk level and mitigations. When the
//! agent may use the `static_analysis` tool, its findings are merged in.

use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::behavior::{AgentContext, RoleBehavior};
use crate::error::AgentError;
use crate::types::{AgentResponse, TaskAssignment};

use super::{source_of, trace_task};

/// Tool consulted for extra findings.
pub const STATIC_ANALYSIS_TOOL: &str = "static_analysis";

const LONG_LINE: usize = 120;
const DEEP_INDENT: usize = 20;

static UNWRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(unwrap|expect)\(").unwrap());
static TODO_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(TODO|FIXME|XXX)\b").unwrap());
static DEBUG_OUTPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(println!|dbg!|console\.log)\s*\(").unwrap());
static UNSAFE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bunsafe\b").unwrap());
static HARDCODED_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(password|passwd|secret|api_?key|token)\b\s*[:=]\s*["'][^"']+["']"#).unwrap()
});
static SQL_CONCAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(format!\(\s*"\s*(select|insert|update|delete)\b|"\s*(select|insert|update|delete)\b[^"]*"\s*\+)"#,
    )
    .unwrap()
});
static EVAL_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\beval\s*\(").unwrap());
static PLAIN_HTTP: Lazy<Regex> = Lazy::new(|| Regex::new(r"http://").unwrap());
static WEAK_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(md5|sha1)\b").unwrap());

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points subtracted from the quality score.
    pub fn penalty(&self) -> u32 {
        match self {
            Self::Low => 2,
            Self::Medium => 5,
            Self::High => 10,
            Self::Critical => 20,
        }
    }

    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" | "info" => Self::Low,
            "high" | "error" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Severity {
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

/// One issue or vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    fn at(kind: &str, severity: Severity, line: usize, message: &str) -> Self {
        Self { kind: kind.to_string(), severity, line: Some(line), message: message.to_string() }
    }

    /// Parse a finding reported by the static analysis tool.
    fn from_tool(value: &Value) -> Option<Self> {
        let message = value
            .get("message")
            .or_else(|| value.get("description"))
            .and_then(Value::as_str)?;
        Some(Self {
            kind: value.get("kind").and_then(Value::as_str).unwrap_or("tool").to_string(),
            severity: Severity::parse(value.get("severity").and_then(Value::as_str).unwrap_or("")),
            line: value.get("line").and_then(Value::as_u64).map(|l| l as usize),
            message: message.to_string(),
        })
    }
}

/// Quality score: 100 minus the summed penalties, floored at zero.
pub fn quality_score(findings: &[Finding]) -> u32 {
    let penalty: u32 = findings.iter().map(|f| f.severity.penalty()).sum();
    100u32.saturating_sub(penalty)
}

fn review_suggestion(kind: &str) -> &'static str {
    match kind {
        "unchecked_unwrap" => "Propagate errors with `?` instead of unwrap/expect",
        "todo_marker" => "Resolve or track outstanding TODO/FIXME markers",
        "long_line" => "Break long lines to keep code readable",
        "debug_output" => "Replace debug printing with structured logging",
        "deep_nesting" => "Extract deeply nested blocks into helper functions",
        "unsafe_block" => "Document or eliminate unsafe blocks",
        "hardcoded_secret" => "Move credentials to configuration or a secret store",
        _ => "Address the reported static analysis findings",
    }
}

fn mitigation(kind: &str) -> &'static str {
    match kind {
        "hardcoded_secret" => "Load credentials from the environment or a secret manager",
        "sql_injection" => "Use parameterized queries instead of string building",
        "code_injection" => "Remove dynamic evaluation of untrusted input",
        "plain_http" => "Use HTTPS for all external endpoints",
        "weak_hash" => "Replace MD5/SHA-1 with SHA-256 or a password hash such as argon2",
        "unsafe_block" => "Audit unsafe blocks and encapsulate them behind safe APIs",
        _ => "Review the reported finding and apply the vendor guidance",
    }
}

fn scan_quality(code: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (idx, line) in code.lines().enumerate() {
        let n = idx + 1;
        if UNWRAP.is_match(line) {
            findings.push(Finding::at("unchecked_unwrap", Severity::Medium, n, "Unchecked unwrap/expect"));
        }
        if TODO_MARKER.is_match(line) {
            findings.push(Finding::at("todo_marker", Severity::Low, n, "Outstanding TODO/FIXME marker"));
        }
        if line.chars().count() > LONG_LINE {
            findings.push(Finding::at("long_line", Severity::Low, n, "Line exceeds 120 characters"));
        }
        if DEBUG_OUTPUT.is_match(line) {
            findings.push(Finding::at("debug_output", Severity::Low, n, "Debug output left in code"));
        }
        let indent: usize = line
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum();
        if indent >= DEEP_INDENT && !line.trim().is_empty() {
            findings.push(Finding::at("deep_nesting", Severity::Medium, n, "Deeply nested block"));
        }
        if UNSAFE_BLOCK.is_match(line) {
            findings.push(Finding::at("unsafe_block", Severity::High, n, "Unsafe code"));
        }
        if HARDCODED_SECRET.is_match(line) {
            findings.push(Finding::at("hardcoded_secret", Severity::High, n, "Hard-coded credential"));
        }
    }
    findings
}

fn scan_security(code: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (idx, line) in code.lines().enumerate() {
        let n = idx + 1;
        if HARDCODED_SECRET.is_match(line) {
            findings.push(Finding::at("hardcoded_secret", Severity::Critical, n, "Hard-coded credential"));
        }
        if SQL_CONCAT.is_match(line) {
            findings.push(Finding::at("sql_injection", Severity::High, n, "SQL built from strings"));
        }
        if EVAL_CALL.is_match(line) {
            findings.push(Finding::at("code_injection", Severity::High, n, "Dynamic code evaluation"));
        }
        if PLAIN_HTTP.is_match(line) {
            findings.push(Finding::at("plain_http", Severity::Medium, n, "Plain-text HTTP endpoint"));
        }
        if WEAK_HASH.is_match(line) {
            findings.push(Finding::at("weak_hash", Severity::Medium, n, "Weak hash algorithm"));
        }
        if UNSAFE_BLOCK.is_match(line) {
            findings.push(Finding::at("unsafe_block", Severity::Medium, n, "Unsafe code"));
        }
    }
    findings
}

fn unique<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystMode {
    /// Reviews by default, audits on `security_audit`/`security` tasks.
    Analyst,
    /// Always audits.
    Auditor,
}

#[derive(Debug, Clone, Copy)]
pub struct CodeAnalystRole {
    mode: AnalystMode,
}

impl CodeAnalystRole {
    pub fn analyst() -> Self {
        Self { mode: AnalystMode::Analyst }
    }

    pub fn auditor() -> Self {
        Self { mode: AnalystMode::Auditor }
    }

    pub fn mode(&self) -> AnalystMode {
        self.mode
    }

    fn is_audit(&self, task: &TaskAssignment) -> bool {
        self.mode == AnalystMode::Auditor
            || matches!(task.metadata.task_type.as_str(), "security_audit" | "security")
    }

    async fn tool_findings(
        ctx: &AgentContext,
        task: &TaskAssignment,
        code: &str,
    ) -> Result<Vec<Finding>, AgentError> {
        if !ctx.can_use_tool(STATIC_ANALYSIS_TOOL) {
            return Ok(Vec::new());
        }
        let input = json!({ "code": code, "task_type": task.metadata.task_type });
        let output = ctx.invoke_tool(STATIC_ANALYSIS_TOOL, &input).await?;
        let findings: Vec<Finding> = output
            .get("issues")
            .and_then(Value::as_array)
            .map(|issues| issues.iter().filter_map(Finding::from_tool).collect())
            .unwrap_or_default();
        log::debug!("static_analysis reported {} findings", findings.len());
        Ok(findings)
    }

    fn review(findings: Vec<Finding>, analyzed_lines: usize) -> AgentResponse {
        let score = quality_score(&findings);
        let suggestions = unique(findings.iter().map(|f| review_suggestion(&f.kind)));

        let mut by_severity: Vec<&Finding> = findings.iter().collect();
        by_severity.sort_by(|a, b| b.severity.cmp(&a.severity));
        let recommendations: Vec<String> =
            unique(by_severity.iter().map(|f| review_suggestion(&f.kind)))
                .into_iter()
                .take(3)
                .collect();

        AgentResponse::success(json!({
            "analysis": "code_review",
            "analyzed_lines": analyzed_lines,
            "issues": findings,
            "suggestions": suggestions,
            "quality_score": score,
            "recommendations": recommendations,
        }))
        .with_suggestions(recommendations)
    }

    fn audit(findings: Vec<Finding>) -> AgentResponse {
        let risk_level = findings.iter().map(|f| f.severity).max().unwrap_or(Severity::Low);
        let mitigations = unique(findings.iter().map(|f| mitigation(&f.kind)));

        AgentResponse::success(json!({
            "analysis": "security_audit",
            "vulnerabilities": findings,
            "risk_level": risk_level,
            "mitigations": mitigations,
        }))
        .with_suggestions(mitigations)
    }
}

#[async_trait]
impl RoleBehavior for CodeAnalystRole {
    async fn process_task(
        &self,
        ctx: &AgentContext,
        task: &TaskAssignment,
    ) -> Result<AgentResponse, AgentError> {
        trace_task(ctx, task);
        let code = source_of(task).unwrap_or_default();
        let audit = self.is_audit(task);

        let mut findings = if audit { scan_security(code) } else { scan_quality(code) };
        findings.extend(Self::tool_findings(ctx, task, code).await?);

        Ok(if audit {
            Self::audit(findings)
        } else {
            Self::review(findings, code.lines().count())
        })
    }
}
