//! Candidate filtering and scoring for `find_best_agent_for_task`.

use crate::types::{AgentConfig, AgentMetrics, AgentStatus};

pub const PERFORMANCE_WEIGHT: f64 = 0.4;
pub const AVAILABILITY_WEIGHT: f64 = 0.3;
pub const RESPONSIVENESS_WEIGHT: f64 = 0.2;
pub const SPECIALIZATION_WEIGHT: f64 = 0.1;

/// Average response time at which responsiveness reaches zero.
const RESPONSE_TIME_CEILING_MS: f64 = 10_000.0;

/// Point-in-time view of one agent used for routing.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub config: AgentConfig,
    pub status: AgentStatus,
    pub metrics: AgentMetrics,
}

impl Candidate {
    /// Whether routing may consider this agent at all.
    pub fn is_eligible(&self, task_type: &str, requirements: &[String], min_success_rate: f64) -> bool {
        self.status.is_routable()
            && self.metrics.success_rate > min_success_rate
            && self
                .config
                .capabilities
                .iter()
                .any(|cap| cap.accepts(task_type, requirements))
    }

    /// Weighted score in `[0, 1]`.
    pub fn score(&self, requirements: &[String]) -> f64 {
        let availability = if self.status == AgentStatus::Idle { 1.0 } else { 0.5 };
        let responsiveness =
            (1.0 - self.metrics.average_response_time_ms / RESPONSE_TIME_CEILING_MS).max(0.0);
        let specialization = if self
            .config
            .capabilities
            .iter()
            .any(|cap| cap.name_matches(requirements))
        {
            1.0
        } else {
            0.5
        };

        PERFORMANCE_WEIGHT * self.metrics.success_rate
            + AVAILABILITY_WEIGHT * availability
            + RESPONSIVENESS_WEIGHT * responsiveness
            + SPECIALIZATION_WEIGHT * specialization
    }
}

/// Highest-scoring eligible candidate. Ties go to the earlier candidate.
pub fn select_best<'a>(
    candidates: &'a [Candidate],
    task_type: &str,
    requirements: &[String],
    min_success_rate: f64,
) -> Option<&'a Candidate> {
    let mut best: Option<(&Candidate, f64)> = None;
    for candidate in candidates
        .iter()
        .filter(|c| c.is_eligible(task_type, requirements, min_success_rate))
    {
        let score = candidate.score(requirements);
        log::debug!("Candidate '{}' scored {:.3}", candidate.config.id, score);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c)
}
