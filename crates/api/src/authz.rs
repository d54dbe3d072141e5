//! Authorization engine.
//!
//! Orchestrates the pure decision functions in `memberhub-auth` against the
//! flag store and resource directory. One policy per check, never a mix:
//! either a static access-level minimum or a required-flag set scoped to a
//! resource instance.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use memberhub_auth::{
    AccessLevel, Decision, FlagId, Session, check_access_level, check_required_flags,
    ensure_session,
};
use memberhub_core::{DomainError, DomainResult, EntityId, SubjectId};
use memberhub_infra::{FlagStore, ResourceDirectory};

use crate::classify::RouteClass;

/// What a route requires. Exactly one kind per route.
#[derive(Debug, Clone)]
pub enum PermissionPolicy {
    /// Coarse administrative check against the session's access level.
    MinimumLevel {
        /// Action name used in denial diagnostics, e.g. "audit.read".
        action: &'static str,
        minimum: AccessLevel,
    },
    /// Resource-scoped check: every listed flag must be active for the
    /// subject resolved from the route.
    ResourceFlags {
        resource_type: &'static str,
        required: Vec<FlagId>,
    },
}

/// Evaluates policies for requests.
#[derive(Clone)]
pub struct AuthorizationEngine {
    flags: Arc<dyn FlagStore>,
    resources: Arc<dyn ResourceDirectory>,
}

impl AuthorizationEngine {
    pub fn new(flags: Arc<dyn FlagStore>, resources: Arc<dyn ResourceDirectory>) -> Self {
        Self { flags, resources }
    }

    /// Authorize one request. `Ok(())` means allow; every denial is a
    /// [`DomainError`] carrying the exact reason (401/403/404 on the wire).
    pub async fn authorize(
        &self,
        session: Option<&Session>,
        policy: &PermissionPolicy,
        route: &RouteClass,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let session = ensure_session(session, now).map_err(|r| r.into_error())?;

        match policy {
            PermissionPolicy::MinimumLevel { action, minimum } => {
                match check_access_level(session, action, *minimum) {
                    Decision::Allow => Ok(()),
                    Decision::Deny(reason) => Err(reason.into_error()),
                }
            }
            PermissionPolicy::ResourceFlags {
                resource_type,
                required,
            } => {
                // The subject defaults to the entity id the route addresses.
                let id = route.entity_id.ok_or_else(|| {
                    DomainError::validation(format!(
                        "{resource_type} route carries no resource id"
                    ))
                })?;

                // A missing resource is 404, never 403.
                if !self.resources.exists(resource_type, EntityId::new(id)).await? {
                    return Err(DomainError::not_found(*resource_type, Some(id)));
                }

                let active = self
                    .flags
                    .list_for_subject(SubjectId::new(id), now)
                    .await?;
                let resource = format!("{resource_type}/{id}");
                match check_required_flags(required, &active, &resource) {
                    Decision::Allow => Ok(()),
                    Decision::Deny(reason) => Err(reason.into_error()),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
