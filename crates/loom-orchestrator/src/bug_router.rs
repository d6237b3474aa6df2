use crate::types::Task;
use serde::Serialize;
use std::collections::HashSet;

/// Routing decision for an auto-filed bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BugRoute {
    pub should_route: bool,
    /// Persona that should pick the bug up.
    pub persona_hint: Option<String>,
    /// Original title prefixed with `[<persona>]`.
    pub updated_title: Option<String>,
    pub reason: String,
}

/// Existing bracket hints that mean the bug was already triaged.
const TRIAGED_PERSONAS: &[&str] = &[
    "web-designer",
    "backend-engineer",
    "devops-engineer",
    "qa-engineer",
    "ceo",
    "cfo",
];

struct Category {
    persona: &'static str,
    reason: &'static str,
    indicators: &'static [&'static str],
    tags: &'static [&'static str],
}

/// Checked in order. Build errors come first since their text also tends
/// to mention compilers and runtimes.
const CATEGORIES: &[Category] = &[
    Category {
        persona: "devops-engineer",
        reason: "Build or deployment error detected",
        indicators: &[
            "build failed", "docker", "dockerfile", "compile", "deployment", "makefile",
            "ci/cd", "pipeline", "container",
        ],
        tags: &["build", "deployment", "docker"],
    },
    Category {
        persona: "web-designer",
        reason: "Frontend JavaScript error detected",
        indicators: &[
            "javascript", "js_error", "syntaxerror", "referenceerror", "typeerror", "uncaught",
            "undefined", "is not a function", "is not defined", "cannot read",
            "cannot access", "ui error",
        ],
        tags: &["frontend", "javascript", "js_error"],
    },
    Category {
        persona: "backend-engineer",
        reason: "Backend compilation or runtime error detected",
        indicators: &[
            "panic", "runtime error", "nil pointer", "invalid memory", "undefined:",
            "cannot use", "go build", "compilation error",
        ],
        tags: &["backend", "golang", "go_error"],
    },
    Category {
        persona: "backend-engineer",
        reason: "API/HTTP error detected",
        indicators: &[
            "api error", "api request failed", "http", "status code", "endpoint",
            "route not found", "405", "404", "500", "502", "503",
        ],
        tags: &["api", "api_error", "http"],
    },
    Category {
        persona: "backend-engineer",
        reason: "Database error detected",
        indicators: &[
            "database", "sql", "query", "connection refused", "postgres", "sqlite", "deadlock",
            "constraint", "foreign key",
        ],
        tags: &["database", "sql", "db_error"],
    },
    Category {
        persona: "web-designer",
        reason: "CSS or styling error detected",
        indicators: &[
            "css", "style", "layout", "rendering", "display", "flexbox", "grid", "responsive",
        ],
        tags: &["css", "styling", "ui"],
    },
];

/// Classifies auto-filed bugs so they reach a suitable persona.
#[derive(Debug, Clone, Copy, Default)]
pub struct BugRouter;

impl BugRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, task: &Task) -> BugRoute {
        if !task.is_auto_filed() || has_triage_hint(&task.title) {
            return BugRoute::default();
        }

        let title = task.title.to_lowercase();
        let description = task.description.to_lowercase();
        let tags: HashSet<String> = task.tags.iter().map(|t| t.to_lowercase()).collect();

        for category in CATEGORIES {
            let by_text = category
                .indicators
                .iter()
                .any(|i| title.contains(i) || description.contains(i));
            let by_tag = category.tags.iter().any(|t| tags.contains(*t));
            if by_text || by_tag {
                return BugRoute {
                    should_route: true,
                    persona_hint: Some(category.persona.to_string()),
                    updated_title: Some(format!("[{}] {}", category.persona, task.title)),
                    reason: category.reason.to_string(),
                };
            }
        }

        BugRoute {
            reason: "Bug type unclear, needs QA triage".to_string(),
            ..BugRoute::default()
        }
    }
}

fn has_triage_hint(title: &str) -> bool {
    let title = title.to_lowercase();
    TRIAGED_PERSONAS
        .iter()
        .any(|p| title.contains(&format!("[{p}]")))
}
