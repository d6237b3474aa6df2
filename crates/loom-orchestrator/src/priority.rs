use crate::config::PriorityConfig;
use crate::types::Task;

/// Computes the effective priority of a task before dispatch.
///
/// Implementations must be pure: same task in, same number out, and no
/// access to the registry.
pub trait PriorityEvaluator: Send + Sync {
    /// Effective priority for `task` (higher is more urgent).
    fn evaluate(&self, task: &Task) -> i32;
}

/// Default evaluator: keyword boosts and penalties, then clamping.
#[derive(Debug, Clone)]
pub struct KeywordPriorityEvaluator {
    config: PriorityConfig,
}

impl KeywordPriorityEvaluator {
    pub fn new(mut config: PriorityConfig) -> Self {
        for keyword in config
            .urgency_keywords
            .iter_mut()
            .chain(config.deferral_keywords.iter_mut())
        {
            *keyword = keyword.to_lowercase();
        }
        Self { config }
    }

    fn mentions_any(text: &str, keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|k| !k.is_empty() && contains_word(text, k))
    }
}

impl Default for KeywordPriorityEvaluator {
    fn default() -> Self {
        Self::new(PriorityConfig::default())
    }
}

impl PriorityEvaluator for KeywordPriorityEvaluator {
    fn evaluate(&self, task: &Task) -> i32 {
        let text = task.searchable_text();
        let mut priority = task.priority;

        if Self::mentions_any(&text, &self.config.urgency_keywords) {
            priority = priority.saturating_add(self.config.urgency_boost);
        }
        if Self::mentions_any(&text, &self.config.deferral_keywords) {
            priority = priority.saturating_sub(self.config.deferral_penalty);
        }
        if task.is_auto_filed() {
            priority = priority.saturating_add(self.config.auto_filed_boost);
        }

        priority.clamp(self.config.min_priority, self.config.max_priority)
    }
}

/// Whether `keyword` occurs in `text` on word boundaries, so `p0` does not
/// match inside `p01` and `chore` does not match `chores-list`.
fn contains_word(text: &str, keyword: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + keyword.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> KeywordPriorityEvaluator {
        KeywordPriorityEvaluator::default()
    }

    #[test]
    fn test_plain_task_keeps_priority() {
        let task = Task::new("b1", "Add a settings page").with_priority(3);
        assert_eq!(evaluator().evaluate(&task), 3);
    }

    #[test]
    fn test_urgency_boost_applies_once() {
        let task = Task::new("b1", "URGENT: critical outage in checkout").with_priority(3);
        assert_eq!(evaluator().evaluate(&task), 5);
    }

    #[test]
    fn test_urgency_from_tags() {
        let task = Task::new("b1", "Rotate credentials")
            .with_tags(["Security"])
            .with_priority(1);
        assert_eq!(evaluator().evaluate(&task), 3);
    }

    #[test]
    fn test_deferral_penalty() {
        let task = Task::new("b1", "Fix typo in README").with_priority(2);
        assert_eq!(evaluator().evaluate(&task), 1);
    }

    #[test]
    fn test_auto_filed_boost() {
        let task = Task::new("b1", "ReferenceError in UI")
            .with_title("[auto-filed] UI Error")
            .with_priority(2);
        assert_eq!(evaluator().evaluate(&task), 3);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let high = Task::new("b1", "hotfix asap").with_priority(50);
        assert_eq!(evaluator().evaluate(&high), 10);

        let low = Task::new("b2", "someday cleanup").with_priority(-7);
        assert_eq!(evaluator().evaluate(&low), 0);

        let extreme = Task::new("b3", "urgent").with_priority(i32::MAX);
        assert_eq!(evaluator().evaluate(&extreme), 10);
    }

    #[test]
    fn test_keywords_match_on_word_boundaries() {
        let task = Task::new("b1", "bump version to p01 and update chores-list").with_priority(4);
        // `chores-list` still contains `chore` followed by `s`, a word char.
        assert_eq!(evaluator().evaluate(&task), 4);

        let task = Task::new("b2", "p0 regression").with_priority(4);
        assert_eq!(evaluator().evaluate(&task), 6);
    }

    #[test]
    fn test_deterministic() {
        let task = Task::new("b1", "critical blocker, nice to have cleanup later")
            .with_tags(["auto-filed"])
            .with_priority(5);
        let first = evaluator().evaluate(&task);
        for _ in 0..5 {
            assert_eq!(evaluator().evaluate(&task), first);
        }
        assert_eq!(first, 7);
    }

    #[test]
    fn test_custom_keywords_case_insensitive() {
        let config = PriorityConfig {
            urgency_keywords: vec!["SEV1".into()],
            urgency_boost: 4,
            ..PriorityConfig::default()
        };
        let evaluator = KeywordPriorityEvaluator::new(config);
        let task = Task::new("b1", "sev1 incident").with_priority(1);
        assert_eq!(evaluator.evaluate(&task), 5);
    }
}
