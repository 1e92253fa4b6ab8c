use async_trait::async_trait;

use super::{Classifier, ClassifierError};

/// 按顺序匹配的关键字规则，命中任一关键字即打上对应标签
const RULES: &[(&str, &[&str])] = &[
    ("security", &["auth", "login", "token", "password", "credential", "session"]),
    ("bug", &["bug", "error", "crash", "exception", "fail", "broken"]),
    ("enhancement", &["feature", "enhancement", "improve", "add", "new"]),
    ("ui", &["ui", "interface", "design", "frontend", "css", "responsive"]),
    ("backend", &["api", "backend", "server", "database", "endpoint"]),
    ("performance", &["performance", "slow", "optimize", "speed", "latency"]),
    ("testing", &["test", "testing", "unit", "integration", "coverage"]),
    ("documentation", &["documentation", "docs", "readme", "guide", "manual"]),
    ("deployment", &["deployment", "deploy", "production", "staging", "ci/cd"]),
    ("urgent", &["urgent", "critical", "blocker", "hotfix"]),
];

const FALLBACK_TAG: &str = "general";

/// 进程内关键字分类器，不依赖外部服务
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn tags(title: &str, description: &str) -> Vec<String> {
        let text = format!("{} {}", title, description).to_lowercase();
        let mut tags: Vec<String> = RULES
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(tag, _)| tag.to_string())
            .collect();
        if tags.is_empty() {
            tags.push(FALLBACK_TAG.to_string());
        }
        tags
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Vec<String>, ClassifierError> {
        Ok(Self::tags(title, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_case_insensitive_and_ordered() {
        assert_eq!(KeywordClassifier::tags("Login FAILS", ""), vec!["security", "bug"]);
        assert_eq!(
            KeywordClassifier::tags("Slow API", "endpoint"),
            vec!["backend", "performance"]
        );
    }

    #[test]
    fn each_tag_appears_once() {
        let tags = KeywordClassifier::tags("bug bug", "crash error broken");
        assert_eq!(tags, vec!["bug"]);
    }

    #[test]
    fn unmatched_text_is_general() {
        assert_eq!(KeywordClassifier::tags("Hello world", ""), vec!["general"]);
    }

    #[test]
    fn description_participates() {
        assert_eq!(KeywordClassifier::tags("Hello", "urgent"), vec!["urgent"]);
    }
}
