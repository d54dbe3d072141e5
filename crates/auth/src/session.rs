//! Authenticated session model.
//!
//! Sessions are created by the authentication subsystem; this crate only
//! reads them. Expiry is evaluated against an injected `now`, never a global
//! clock, so checks stay deterministic under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memberhub_core::{ActorId, SessionId};

use crate::access::AccessLevel;

/// Read-only view of an authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: ActorId,
    pub email: String,
    pub display_name: String,
    pub access_level: AccessLevel,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// True once the expiry instant has been reached (inclusive).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
