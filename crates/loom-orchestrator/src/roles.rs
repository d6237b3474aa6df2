/// Keyword to role table, scanned in order.
///
/// A keyword must come before any shorter keyword that is a substring of it
/// (`qa-engineer` before `qa`), otherwise the generic entry would shadow the
/// compound one.
const ROLE_KEYWORDS: &[(&str, &str)] = &[
    ("qa-engineer", "QA"),
    ("quality-assurance", "QA"),
    ("engineering-manager", "Engineering Manager"),
    ("eng-manager", "Engineering Manager"),
    ("product-manager", "Product Manager"),
    ("web-designer", "Web Designer"),
    ("backend-engineer", "Backend Engineer"),
    ("frontend-engineer", "Frontend Engineer"),
    ("code-reviewer", "Code Reviewer"),
    ("qa", "QA"),
    ("pm", "Product Manager"),
    ("designer", "Web Designer"),
    ("backend", "Backend Engineer"),
    ("frontend", "Frontend Engineer"),
    ("reviewer", "Code Reviewer"),
    ("ceo", "CEO"),
];

/// Role labels used by workflow definitions.
pub const WORKFLOW_ROLES: &[&str] = &[
    "QA",
    "Engineering Manager",
    "Product Manager",
    "Web Designer",
    "Backend Engineer",
    "Frontend Engineer",
    "Code Reviewer",
    "CEO",
];

/// The last non-empty `/`-separated segment of a persona name.
pub fn persona_leaf(persona_name: &str) -> Option<&str> {
    persona_name
        .split('/')
        .map(str::trim)
        .rfind(|segment| !segment.is_empty())
}

/// Map a persona identifier such as `default/qa-engineer` or
/// `projects/loom/backend-engineer` to a human-readable role label.
///
/// Only the leaf segment is considered. Matching is case-insensitive and
/// substring-based; unknown personas resolve to their own leaf, and input
/// without any non-empty segment resolves to an empty string.
pub fn resolve_role(persona_name: &str) -> String {
    let Some(leaf) = persona_leaf(persona_name) else {
        return String::new();
    };

    let lowered = leaf.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map_or_else(|| leaf.to_string(), |(_, role)| (*role).to_string())
}

/// Whether `token` is exactly one of the known role keywords, ignoring case.
pub fn is_role_keyword(token: &str) -> bool {
    let token = token.trim().to_lowercase();
    ROLE_KEYWORDS.iter().any(|(keyword, _)| *keyword == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_personas() {
        let cases = [
            ("default/qa-engineer", "QA"),
            ("custom/qa", "QA"),
            ("default/quality-assurance", "QA"),
            ("default/engineering-manager", "Engineering Manager"),
            ("custom/eng-manager", "Engineering Manager"),
            ("default/product-manager", "Product Manager"),
            ("custom/pm", "Product Manager"),
            ("default/web-designer", "Web Designer"),
            ("custom/designer", "Web Designer"),
            ("default/backend-engineer", "Backend Engineer"),
            ("custom/backend", "Backend Engineer"),
            ("default/frontend-engineer", "Frontend Engineer"),
            ("custom/frontend", "Frontend Engineer"),
            ("default/code-reviewer", "Code Reviewer"),
            ("custom/reviewer", "Code Reviewer"),
            ("default/ceo", "CEO"),
        ];
        for (persona, expected) in cases {
            assert_eq!(resolve_role(persona), expected, "persona {persona}");
        }
    }

    #[test]
    fn test_project_scoped_personas() {
        assert_eq!(resolve_role("projects/myproject/qa-engineer"), "QA");
        assert_eq!(
            resolve_role("projects/loom/engineering-manager"),
            "Engineering Manager"
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve_role("default/QA-ENGINEER"), "QA");
        assert_eq!(
            resolve_role("default/Engineering-Manager"),
            "Engineering Manager"
        );
    }

    #[test]
    fn test_fallback_to_leaf() {
        assert_eq!(resolve_role("default/unknown-role"), "unknown-role");
        assert_eq!(resolve_role("custom/unknown-role"), "unknown-role");
        assert_eq!(resolve_role("projects/myproject/unknown"), "unknown");
        assert_eq!(resolve_role("generic-agent"), "generic-agent");
        assert_eq!(resolve_role("default/cto"), "cto");
        // Original casing of the leaf is preserved.
        assert_eq!(resolve_role("Team/Release-Captain"), "Release-Captain");
    }

    #[test]
    fn test_edge_cases() {
        assert_eq!(resolve_role(""), "");
        assert_eq!(resolve_role("   "), "");
        assert_eq!(resolve_role("/"), "");
        assert_eq!(resolve_role("//"), "");
        assert_eq!(resolve_role("a/b/c/d/qa-engineer"), "QA");
        assert_eq!(resolve_role("default/qa-engineer/"), "QA");
    }

    #[test]
    fn test_specific_keyword_wins() {
        assert_eq!(resolve_role("default/backend-engineer"), "Backend Engineer");
        assert_eq!(resolve_role("custom/backend-engineer"), "Backend Engineer");
        assert_eq!(resolve_role("default/qa-engineer"), "QA");
    }

    #[test]
    fn test_table_ordering_keeps_specific_first() {
        for (i, (generic, _)) in ROLE_KEYWORDS.iter().enumerate() {
            for (specific, _) in &ROLE_KEYWORDS[i + 1..] {
                assert!(
                    !(specific.contains(generic) && specific != generic),
                    "'{specific}' is shadowed by earlier keyword '{generic}'"
                );
            }
        }
    }

    #[test]
    fn test_workflow_roles_resolvable() {
        let personas = [
            "default/qa-engineer",
            "default/engineering-manager",
            "default/product-manager",
            "default/web-designer",
            "default/backend-engineer",
            "default/frontend-engineer",
            "default/code-reviewer",
            "default/ceo",
        ];
        for (persona, role) in personas.iter().zip(WORKFLOW_ROLES) {
            assert_eq!(resolve_role(persona), *role);
        }
    }

    #[test]
    fn test_is_role_keyword() {
        assert!(is_role_keyword("qa-engineer"));
        assert!(is_role_keyword("CEO"));
        assert!(is_role_keyword("pm"));
        assert!(!is_role_keyword("npm"));
        assert!(!is_role_keyword("fix"));
        assert!(!is_role_keyword(""));
    }

    #[test]
    fn test_persona_leaf() {
        assert_eq!(persona_leaf("default/qa-engineer/"), Some("qa-engineer"));
        assert_eq!(persona_leaf("solo"), Some("solo"));
        assert_eq!(persona_leaf(" / "), None);
    }
}
