//! Explicit persona hints written into tasks.
//!
//! Submitters steer work to a kind of agent by naming a persona in the task
//! text ("ask the backend-engineer to ...", "[web-designer] Fix layout") or
//! with a `persona:<name>` tag. The dispatcher uses the extracted hint as a
//! scoring signal.

use crate::roles::{is_role_keyword, persona_leaf, resolve_role, WORKFLOW_ROLES};
use crate::types::{Agent, Task};
use regex::Regex;
use std::sync::LazyLock;

/// `**FOR web-designer AGENT**`
#[allow(clippy::expect_used)]
static BOLD_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*\s*for\s+([^*]+?)\s*\*\*").expect("constant regex pattern is valid")
});

/// `[web-designer] Fix layout`, possibly after other bracket groups.
#[allow(clippy::expect_used)]
static BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("constant regex pattern is valid"));

/// `ask the backend-engineer to fix this`
#[allow(clippy::expect_used)]
static ASK_THE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bask\s+the\s+(.+?)\s+to\b").expect("constant regex pattern is valid")
});

/// `for devops-engineer: deploy this`
#[allow(clippy::expect_used)]
static FOR_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*for\s+([a-z0-9][a-z0-9 _-]*?)\s*:").expect("constant regex pattern is valid")
});

/// `qa-engineer: test this feature`
#[allow(clippy::expect_used)]
static LEADING_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([a-z0-9][a-z0-9_-]+)\s*:").expect("constant regex pattern is valid")
});

/// Bracket labels that mark a task's origin or state rather than a persona.
const NON_PERSONA_BRACKETS: &[&str] = &["auto-filed", "bug", "wip", "draft", "blocked"];

/// Trailing words that make a hyphenated token read as a persona name.
const PERSONA_SUFFIXES: &[&str] = &[
    "engineer", "designer", "manager", "reviewer", "architect", "writer", "lead",
];

/// Extracts persona hints from tasks and matches them against agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonaMatcher;

impl PersonaMatcher {
    pub fn new() -> Self {
        Self
    }

    /// The normalised persona hint carried by a task, if any.
    ///
    /// The title wins over the description; `persona-<name>` and
    /// `persona:<name>` tags are the last resort.
    pub fn extract_hint(&self, task: &Task) -> Option<String> {
        self.extract_from_text(&task.title)
            .or_else(|| self.extract_from_text(&task.description))
            .or_else(|| task.tags.iter().find_map(|tag| tag_hint(tag)))
    }

    /// Scan free text for a persona hint.
    pub fn extract_from_text(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }

        let raw = capture(&BOLD_FOR, text)
            .or_else(|| {
                BRACKET
                    .captures_iter(text)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .find(|label| {
                        let label = label.trim().to_lowercase();
                        !NON_PERSONA_BRACKETS.contains(&label.as_str())
                    })
            })
            .or_else(|| capture(&ASK_THE, text))
            .or_else(|| capture(&FOR_COLON, text))
            .or_else(|| capture(&LEADING_COLON, text).filter(|token| names_persona(token)))?;

        Some(normalize_hint(raw)).filter(|h| !h.is_empty())
    }

    /// Whether an agent satisfies a hint.
    pub fn hint_matches(&self, hint: &str, agent: &Agent) -> bool {
        match_rank(&normalize_hint(hint), agent).is_some()
    }

    /// The best agent for a hint: an exact persona match beats a partial
    /// one, which beats a role match. Among equals the first agent wins.
    pub fn find_agent<'a>(&self, hint: &str, agents: &'a [Agent]) -> Option<&'a Agent> {
        let hint = normalize_hint(hint);
        if hint.is_empty() {
            return None;
        }
        agents
            .iter()
            .filter_map(|agent| match_rank(&hint, agent).map(|rank| (rank, agent)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, agent)| agent)
    }
}

fn tag_hint(tag: &str) -> Option<String> {
    let lowered = tag.trim().to_lowercase();
    let name = lowered
        .strip_prefix("persona:")
        .or_else(|| lowered.strip_prefix("persona-"))?;
    let hint = normalize_hint(name);
    // `persona-for-<x>` is not a recognised form.
    if hint.is_empty() || hint == "for" || hint.starts_with("for-") {
        return None;
    }
    Some(hint)
}

/// A bare `<token>:` prefix only counts when the token is a known role or a
/// hyphenated persona name such as `devops-engineer`.
fn names_persona(token: &str) -> bool {
    let hint = normalize_hint(token);
    is_role_keyword(&hint)
        || hint
            .rsplit_once('-')
            .is_some_and(|(_, last)| PERSONA_SUFFIXES.contains(&last))
}

fn capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Canonical form of a hint: lower-case, hyphen-separated, without a
/// trailing `agent` or `only`.
pub fn normalize_hint(raw: &str) -> String {
    let mut words: Vec<String> = raw
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    while words.len() > 1 && matches!(words.last().map(String::as_str), Some("agent" | "only")) {
        words.pop();
    }
    words.join("-")
}

/// 0 = exact persona leaf, 1 = partial persona leaf, 2 = role.
fn match_rank(hint: &str, agent: &Agent) -> Option<u8> {
    if hint.is_empty() {
        return None;
    }

    if let Some(leaf) = persona_leaf(&agent.persona_name).map(str::to_lowercase) {
        if leaf == hint {
            return Some(0);
        }
        if leaf.contains(hint) || hint.contains(leaf.as_str()) {
            return Some(1);
        }
    }

    if normalize_hint(&agent.role) == hint {
        return Some(2);
    }
    let hinted_role = resolve_role(hint);
    if WORKFLOW_ROLES.contains(&hinted_role.as_str()) && hinted_role == agent.role {
        return Some(2);
    }
    None
}
