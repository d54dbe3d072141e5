//! Domain error model.
//!
//! This is a **closed** taxonomy: every error raised by the authorization and
//! audit layers is one of these kinds. The HTTP responder in the api crate
//! matches on it exhaustively, so adding a variant without updating the
//! wire mapping is a compile error.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Why authentication failed (all map to 401 on the wire).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthenticationReason {
    /// No session token was presented.
    Missing,
    /// A token was presented but could not be verified.
    Invalid,
    /// The session exists but its expiry has passed.
    Expired,
}

impl core::fmt::Display for AuthenticationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuthenticationReason::Missing => write!(f, "missing session"),
            AuthenticationReason::Invalid => write!(f, "invalid session"),
            AuthenticationReason::Expired => write!(f, "expired session"),
        }
    }
}

/// Sub-kind for flag-subsystem failures; determines the wire status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlagErrorKind {
    /// The referenced flag definition does not exist (404).
    NotFound,
    /// Caller-supplied flag input was invalid (400).
    Invalid,
    /// Anything else inside the flag subsystem (500).
    Other,
}

/// Domain-level error.
///
/// Infrastructure failures (sqlx, pool, transactions) are carried as opaque
/// strings: raw driver messages go to server logs only, never to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The caller is not authenticated (missing/invalid/expired session).
    #[error("authentication failed: {0}")]
    Authentication(AuthenticationReason),

    /// The authentication backend itself failed (not the caller's fault).
    #[error("session validation failed: {0}")]
    SessionValidation(String),

    /// The caller is authenticated but lacks the required capability.
    #[error("permission denied")]
    PermissionDenied {
        /// The capability or access level that was missing, for diagnostics.
        required: Option<String>,
        /// The resource the check was scoped to, e.g. "member/42".
        resource: Option<String>,
    },

    /// A referenced resource does not exist (surfaced as 404, not 403).
    #[error("{resource} not found")]
    NotFound {
        resource: String,
        id: Option<i64>,
    },

    /// A uniqueness constraint was violated.
    #[error("unique constraint violated on {field}")]
    UniqueConstraint { field: String, value: String },

    /// Caller-supplied payload failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A failure inside the flag subsystem.
    #[error("flag error: {message}")]
    Flag {
        kind: FlagErrorKind,
        message: String,
    },

    /// Database-level failure (query/driver).
    #[error("database error: {0}")]
    Database(String),

    /// Connection/pool-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Transaction begin/commit/rollback failure.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The configured request deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// Anything unclassified. Detail is logged server-side only.
    #[error("internal error: {0}")]
    Unknown(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>, id: Option<i64>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn permission_denied(required: impl Into<String>, resource: Option<String>) -> Self {
        Self::PermissionDenied {
            required: Some(required.into()),
            resource,
        }
    }

    pub fn flag_not_found(msg: impl Into<String>) -> Self {
        Self::Flag {
            kind: FlagErrorKind::NotFound,
            message: msg.into(),
        }
    }

    pub fn flag_invalid(msg: impl Into<String>) -> Self {
        Self::Flag {
            kind: FlagErrorKind::Invalid,
            message: msg.into(),
        }
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }
}
