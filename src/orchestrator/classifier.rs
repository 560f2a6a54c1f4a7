//! Free-text request classification used by `smart_route`.

use crate::types::Priority;

/// Derives request type, priority and skills from a free-text description.
///
/// The default is the keyword heuristic below; a model-backed classifier
/// can be plugged into the orchestrator instead.
pub trait RequestClassifier: Send + Sync {
    fn request_type(&self, description: &str) -> String;
    fn priority(&self, description: &str) -> Priority;
    fn required_skills(&self, description: &str) -> Vec<String>;
}

/// Checked in this order; the first type with a matching keyword wins.
const TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("code_review", &["review", "check", "audit", "analyze code", "code quality"]),
    ("feature_development", &["implement", "build", "create", "develop", "feature"]),
    ("system_optimization", &["optimize", "performance", "speed up", "improve", "slow"]),
    ("task_completion", &["complete", "finish", "todo", "task"]),
];

const DEFAULT_TYPE: &str = "task_completion";

const PRIORITY_KEYWORDS: &[(Priority, &[&str])] = &[
    (Priority::Critical, &["urgent", "critical", "asap"]),
    (Priority::High, &["important", "priority"]),
    (Priority::Low, &["when convenient", "eventually"]),
];

const SKILL_KEYWORDS: &[(&str, &[&str])] = &[
    ("database", &["database", "sql"]),
    ("performance", &["performance", "optimize", "speed"]),
    ("security", &["security", "auth", "vulnerab"]),
    ("testing", &["test"]),
    ("api_design", &["api"]),
    ("frontend", &["frontend", "react", "css"]),
    ("documentation", &["document"]),
    ("refactoring", &["refactor"]),
    ("code_review", &["review"]),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl RequestClassifier for KeywordClassifier {
    fn request_type(&self, description: &str) -> String {
        let text = description.to_lowercase();
        TYPE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(t, _)| *t)
            .unwrap_or(DEFAULT_TYPE)
            .to_string()
    }

    fn priority(&self, description: &str) -> Priority {
        let text = description.to_lowercase();
        PRIORITY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(p, _)| *p)
            .unwrap_or(Priority::Medium)
    }

    fn required_skills(&self, description: &str) -> Vec<String> {
        let text = description.to_lowercase();
        SKILL_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(skill, _)| skill.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgent_database_optimization() {
        let c = KeywordClassifier::new();
        let text = "This is urgent, please optimize the database performance";
        assert_eq!(c.request_type(text), "system_optimization");
        assert_eq!(c.priority(text), Priority::Critical);
        let skills = c.required_skills(text);
        assert!(skills.contains(&"performance".to_string()));
        assert!(skills.contains(&"database".to_string()));
    }

    #[test]
    fn test_type_order_and_default() {
        let c = KeywordClassifier::new();
        // "review" is checked before "implement".
        assert_eq!(c.request_type("Review and implement the login"), "code_review");
        assert_eq!(c.request_type("Build a REST api"), "feature_development");
        assert_eq!(c.request_type("hello there"), "task_completion");
    }

    #[test]
    fn test_priority_levels() {
        let c = KeywordClassifier::new();
        assert_eq!(c.priority("An important fix"), Priority::High);
        assert_eq!(c.priority("Do this when convenient"), Priority::Low);
        assert_eq!(c.priority("Plain request"), Priority::Medium);
        assert_eq!(c.priority("ASAP please"), Priority::Critical);
    }

    #[test]
    fn test_skills_are_unique_and_ordered() {
        let c = KeywordClassifier::new();
        let skills = c.required_skills("Review the SQL database tests and refactor the React frontend");
        assert_eq!(
            skills,
            vec!["database", "testing", "frontend", "refactoring", "code_review"]
        );
    }
}
