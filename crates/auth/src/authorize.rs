//! Pure authorization decisions.
//!
//! - No IO
//! - No panics
//! - Deterministic for a given (session, policy, flag-state, now)
//!
//! A caller picks exactly one policy per action: an access-level minimum or a
//! required-flag set. The two are never combined with OR; mixing would make
//! denial reasons ambiguous.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use memberhub_core::DomainError;

use crate::access::AccessLevel;
use crate::flags::FlagId;
use crate::session::Session;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Why a check denied. Closed set; each maps to exactly one wire error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MissingSession,
    ExpiredSession,
    PermissionDenied {
        /// The missing access level or the first missing flag, for diagnostics.
        required: String,
        resource: Option<String>,
    },
    ResourceNotFound {
        resource: String,
        id: i64,
    },
}

impl DenyReason {
    /// Map into the domain error taxonomy (401/403/404 on the wire).
    pub fn into_error(self) -> DomainError {
        match self {
            DenyReason::MissingSession => DomainError::Authentication(
                memberhub_core::AuthenticationReason::Missing,
            ),
            DenyReason::ExpiredSession => DomainError::Authentication(
                memberhub_core::AuthenticationReason::Expired,
            ),
            DenyReason::PermissionDenied { required, resource } => DomainError::PermissionDenied {
                required: Some(required),
                resource,
            },
            DenyReason::ResourceNotFound { resource, id } => {
                DomainError::not_found(resource, Some(id))
            }
        }
    }
}

/// Require a live session before any further check.
pub fn ensure_session(
    session: Option<&Session>,
    now: DateTime<Utc>,
) -> Result<&Session, DenyReason> {
    let session = session.ok_or(DenyReason::MissingSession)?;
    if session.is_expired(now) {
        return Err(DenyReason::ExpiredSession);
    }
    Ok(session)
}

/// Coarse administrative check: allow iff the session's level meets the
/// static minimum for the action.
pub fn check_access_level(session: &Session, action: &str, minimum: AccessLevel) -> Decision {
    if session.access_level >= minimum {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::PermissionDenied {
            required: format!("{} (access level {})", action, minimum),
            resource: None,
        })
    }
}

/// Resource-scoped check: allow iff **every** required flag is active for the
/// subject. The first missing flag is named for diagnostics.
pub fn check_required_flags(
    required: &[FlagId],
    active: &HashSet<FlagId>,
    resource: &str,
) -> Decision {
    for flag in required {
        if !active.contains(flag) {
            return Decision::Deny(DenyReason::PermissionDenied {
                required: flag.to_string(),
                resource: Some(resource.to_string()),
            });
        }
    }
    Decision::Allow
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
