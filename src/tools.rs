//! Tool/capability executor collaborator.
//!
//! Role logic reaches external actions (HTTP calls, file operations, model
//! prompts) only through [`ToolExecutor`]. Failures surface as
//! [`ToolError`] and end up as ordinary failed responses.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// Executes a named tool with a JSON input.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &str, input: &Value) -> Result<Value, ToolError>;

    /// Names of the tools this executor can run.
    fn available_tools(&self) -> Vec<String>;
}

/// Executor answering each tool with a fixed result.
#[derive(Debug, Default, Clone)]
pub struct StaticToolExecutor {
    responses: HashMap<String, Result<Value, ToolError>>,
}

impl StaticToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a tool that succeeds with `output`.
    pub fn with_tool(mut self, name: impl Into<String>, output: Value) -> Self {
        self.responses.insert(name.into(), Ok(output));
        self
    }

    /// Builder: register a tool that always fails.
    pub fn with_failing_tool(mut self, name: impl Into<String>, error: ToolError) -> Self {
        self.responses.insert(name.into(), Err(error));
        self
    }
}

#[async_trait]
impl ToolExecutor for StaticToolExecutor {
    async fn execute(&self, tool: &str, _input: &Value) -> Result<Value, ToolError> {
        match self.responses.get(tool) {
            Some(result) => result.clone(),
            None => Err(ToolError::NotFound(tool.to_string())),
        }
    }

    fn available_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.responses.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_executor() {
        let exec = StaticToolExecutor::new()
            .with_tool("static_analysis", json!({"issues": []}))
            .with_failing_tool("http_get", ToolError::Timeout(500));

        assert_eq!(exec.execute("static_analysis", &json!({})).await.unwrap(), json!({"issues": []}));
        assert!(matches!(
            exec.execute("http_get", &json!({})).await,
            Err(ToolError::Timeout(500))
        ));
        assert!(matches!(
            exec.execute("missing", &json!({})).await,
            Err(ToolError::NotFound(_))
        ));
        assert_eq!(exec.available_tools(), vec!["http_get", "static_analysis"]);
    }
}
