//! Route classification.
//!
//! Maps an incoming path + HTTP method to the entity type, optional entity
//! id, and logical action the request operates on. Pure string work so the
//! audit and permission layers can share one interpretation of a request.
//! No IO. No panics.

use axum::http::Method;
use memberhub_core::Action;

/// Classification of one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteClass {
    /// Singular entity type, e.g. "member". Empty when the path carries none.
    pub entity_type: String,
    /// Numeric entity id when the second path segment parses as one.
    pub entity_id: Option<i64>,
    pub action: Action,
    /// Path segments after the entity id, left uninterpreted.
    pub rest: Vec<String>,
}

impl RouteClass {
    fn unmatched() -> Self {
        Self {
            entity_type: String::new(),
            entity_id: None,
            action: Action::Unknown,
            rest: Vec::new(),
        }
    }
}

/// Classify `path` under `api_prefix` (e.g. "/api").
///
/// Paths outside the prefix classify as unmatched (empty entity type,
/// `Action::Unknown`), which downstream layers treat as "not ours".
pub fn classify(path: &str, method: &Method, api_prefix: &str) -> RouteClass {
    let Some(tail) = path.strip_prefix(api_prefix) else {
        return RouteClass::unmatched();
    };
    if !tail.is_empty() && !tail.starts_with('/') {
        // "/apix/..." must not match an "/api" prefix.
        return RouteClass::unmatched();
    }

    let mut segments = tail.split('/').filter(|s| !s.is_empty());

    let entity_type = match segments.next() {
        Some(seg) => singularize(seg),
        None => return RouteClass::unmatched(),
    };

    let mut rest: Vec<String> = Vec::new();
    let entity_id = match segments.next() {
        Some(seg) => match seg.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                rest.push(seg.to_string());
                None
            }
        },
        None => None,
    };
    rest.extend(segments.map(str::to_string));

    let action = match method.as_str() {
        "GET" => {
            if entity_id.is_some() {
                Action::View
            } else {
                Action::Search
            }
        }
        "POST" => Action::Create,
        "PUT" | "PATCH" => Action::Update,
        "DELETE" => Action::Delete,
        _ => Action::Unknown,
    };

    RouteClass {
        entity_type,
        entity_id,
        action,
        rest,
    }
}

/// Collection segments are plural in the URL space ("members", "events");
/// audit rows and permission checks use the singular form.
fn singularize(segment: &str) -> String {
    segment.strip_suffix('s').unwrap_or(segment).to_string()
}
