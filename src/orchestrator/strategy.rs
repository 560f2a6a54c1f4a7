//! Request type → strategy → workflow plan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::AgentRole;

use super::types::{CoordinationMode, MultiAgentWorkflow, OrchestrationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SequentialAnalysis,
    CollaborativeDesign,
    ParallelAnalysis,
    AdaptiveDelegation,
}

impl Strategy {
    /// Static request-type table; unknown types use adaptive delegation.
    pub fn for_request_type(request_type: &str) -> Self {
        match request_type {
            "code_review" => Self::SequentialAnalysis,
            "feature_development" => Self::CollaborativeDesign,
            "system_optimization" => Self::ParallelAnalysis,
            _ => Self::AdaptiveDelegation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SequentialAnalysis => "sequential_analysis",
            Self::CollaborativeDesign => "collaborative_design",
            Self::ParallelAnalysis => "parallel_analysis",
            Self::AdaptiveDelegation => "adaptive_delegation",
        }
    }

    /// Expand the strategy into a workflow for `request`.
    pub fn plan(&self, request: &OrchestrationRequest) -> MultiAgentWorkflow {
        use AgentRole::*;
        let description = format!("{} for: {}", self.as_str(), request.description);
        match self {
            Self::SequentialAnalysis => MultiAgentWorkflow::new(
                self.as_str(),
                description,
                vec![CodeAnalyst, SecurityAuditor, PerformanceOptimizer],
                CoordinationMode::Sequential,
                CodeAnalyst,
            )
            .with_completion_criteria(&[
                "Code quality reviewed",
                "Security risks assessed",
                "Performance hotspots identified",
            ]),
            Self::CollaborativeDesign => MultiAgentWorkflow::new(
                self.as_str(),
                description,
                vec![TaskManager, CodeAnalyst, Developer, SecurityAuditor],
                CoordinationMode::Hybrid,
                TaskManager,
            )
            .with_completion_criteria(&[
                "Work decomposed and assigned",
                "Design reviewed by specialists",
            ]),
            Self::ParallelAnalysis => MultiAgentWorkflow::new(
                self.as_str(),
                description,
                vec![CodeAnalyst, PerformanceOptimizer, MemoryCurator],
                CoordinationMode::Parallel,
                CodeAnalyst,
            )
            .with_completion_criteria(&["All analyses returned"]),
            Self::AdaptiveDelegation => MultiAgentWorkflow::new(
                self.as_str(),
                description,
                vec![TaskManager, CodeAnalyst, PerformanceOptimizer, MemoryCurator, Developer, SecurityAuditor],
                CoordinationMode::Hybrid,
                TaskManager,
            )
            .with_completion_criteria(&["Task delegated to the right specialists"]),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_table() {
        assert_eq!(Strategy::for_request_type("code_review"), Strategy::SequentialAnalysis);
        assert_eq!(Strategy::for_request_type("feature_development"), Strategy::CollaborativeDesign);
        assert_eq!(Strategy::for_request_type("system_optimization"), Strategy::ParallelAnalysis);
        assert_eq!(Strategy::for_request_type("task_completion"), Strategy::AdaptiveDelegation);
        assert_eq!(Strategy::for_request_type("unheard_of"), Strategy::AdaptiveDelegation);
    }

    #[test]
    fn test_plans() {
        let req = OrchestrationRequest::new("code_review", "review auth module");

        let seq = Strategy::SequentialAnalysis.plan(&req);
        assert_eq!(seq.coordination, CoordinationMode::Sequential);
        assert_eq!(
            seq.agents,
            vec![AgentRole::CodeAnalyst, AgentRole::SecurityAuditor, AgentRole::PerformanceOptimizer]
        );

        let hybrid = Strategy::CollaborativeDesign.plan(&req);
        assert_eq!(hybrid.entry_point, AgentRole::TaskManager);
        assert!(hybrid.includes(&AgentRole::Developer));

        let par = Strategy::ParallelAnalysis.plan(&req);
        assert_eq!(par.coordination, CoordinationMode::Parallel);
        assert_eq!(par.agents.len(), 3);

        assert_eq!(Strategy::AdaptiveDelegation.plan(&req).agents.len(), 6);
    }
}
