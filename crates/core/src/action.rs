//! Semantic action derived from route shape.

use serde::{Deserialize, Serialize};

/// What a request semantically did to an entity.
///
/// Derived from HTTP method and path by the route classifier; also the action
/// vocabulary of the audit trail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    View,
    Search,
    /// Low-sensitivity annotation sub-action; written by handlers, never
    /// derived from method.
    Note,
    /// Sentinel for unclassifiable requests. Unknown degrades to "skip",
    /// never to an error.
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::View => "view",
            Action::Search => "search",
            Action::Note => "note",
            Action::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "create" => Action::Create,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "view" => Action::View,
            "search" => Action::Search,
            "note" => Action::Note,
            _ => Action::Unknown,
        }
    }

    /// Only mutations carry a new-value snapshot in the audit trail.
    pub fn captures_payload(&self) -> bool {
        matches!(self, Action::Create | Action::Update)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
