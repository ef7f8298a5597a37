//! Key namespacing convention
//!
//! Project and agent scope are encoded into plain key / query strings as
//! `[project][agent] text`. The engine never parses them back.

use serde::{Deserialize, Serialize};

/// How widely a search looks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// One agent within one project
    #[default]
    Agent,
    /// Every agent of a project
    Project,
    /// Everything
    Global,
}

impl SearchScope {
    /// Parse a scope name; anything unrecognized is global
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "agent" => SearchScope::Agent,
            "project" => SearchScope::Project,
            _ => SearchScope::Global,
        }
    }
}

/// Storage key for `content` written by `agent` in `project`
pub fn memory_key(project: &str, agent: &str, content: &str) -> String {
    format!("[{}][{}] {}", project, agent, content)
}

/// Search query for `scope`.
///
/// Agent scope without an agent role searches globally.
pub fn scoped_query(query: &str, project: &str, agent: Option<&str>, scope: SearchScope) -> String {
    match (scope, agent.filter(|a| !a.is_empty())) {
        (SearchScope::Agent, Some(agent)) => format!("[{}][{}] {}", project, agent, query),
        (SearchScope::Project, _) => format!("[{}] {}", project, query),
        _ => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_key() {
        assert_eq!(memory_key("p1", "dev", "use tabs"), "[p1][dev] use tabs");
    }

    #[test]
    fn test_scoped_query() {
        assert_eq!(
            scoped_query("tabs", "p1", Some("dev"), SearchScope::Agent),
            "[p1][dev] tabs"
        );
        assert_eq!(
            scoped_query("tabs", "p1", Some("dev"), SearchScope::Project),
            "[p1] tabs"
        );
        assert_eq!(scoped_query("tabs", "p1", Some("dev"), SearchScope::Global), "tabs");
        assert_eq!(scoped_query("tabs", "p1", Some(""), SearchScope::Agent), "tabs");
        assert_eq!(scoped_query("tabs", "p1", None, SearchScope::Agent), "tabs");
    }

    #[test]
    fn test_scope_names() {
        assert_eq!(SearchScope::from_name("Agent"), SearchScope::Agent);
        assert_eq!(SearchScope::from_name("project"), SearchScope::Project);
        assert_eq!(SearchScope::from_name("global"), SearchScope::Global);
        assert_eq!(SearchScope::from_name("team"), SearchScope::Global);
    }
}
