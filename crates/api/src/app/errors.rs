//! Wire mapping of the domain error taxonomy.
//!
//! Exhaustive by construction: adding a `DomainError` variant without a row
//! here fails to compile. Infrastructure detail never reaches the client;
//! 5xx bodies carry a generic message and the real error goes to the logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use memberhub_core::{DomainError, FlagErrorKind};

/// Newtype so `?` works in handlers and middleware (`DomainError` lives in a
/// crate that knows nothing about HTTP).
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(&self.0)
    }
}

pub fn error_response(err: &DomainError) -> Response {
    let (status, body) = status_and_body(err);
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "request failed");
    }
    (status, Json(body)).into_response()
}

fn status_and_body(err: &DomainError) -> (StatusCode, Value) {
    match err {
        DomainError::Authentication(reason) => (
            StatusCode::UNAUTHORIZED,
            json!({
                "error": reason.to_string(),
                "code": "UNAUTHENTICATED",
            }),
        ),
        DomainError::SessionValidation(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "session validation failed",
                "code": "AUTH_SERVICE_ERROR",
            }),
        ),
        DomainError::PermissionDenied { required, resource } => (
            StatusCode::FORBIDDEN,
            json!({
                "error": "permission denied",
                "code": "PERMISSION_DENIED",
                "required_permission": required,
                "resource": resource,
            }),
        ),
        DomainError::NotFound { resource, id } => (
            StatusCode::NOT_FOUND,
            json!({
                "error": format!("{resource} not found"),
                "code": "NOT_FOUND",
                "resource": { "type": resource, "id": id },
            }),
        ),
        DomainError::UniqueConstraint { field, value } => (
            StatusCode::CONFLICT,
            json!({
                "error": format!("{field} already exists"),
                "code": "UNIQUE_CONSTRAINT_VIOLATION",
                "field": field,
                "value": value,
            }),
        ),
        DomainError::Validation(message) => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": message,
                "code": "VALIDATION_ERROR",
            }),
        ),
        DomainError::Flag { kind, message } => match kind {
            FlagErrorKind::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": message, "code": "FLAG_NOT_FOUND" }),
            ),
            FlagErrorKind::Invalid => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "code": "FLAG_VALIDATION_ERROR" }),
            ),
            FlagErrorKind::Other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "flag subsystem error", "code": "FLAG_ERROR" }),
            ),
        },
        DomainError::Database(_) | DomainError::Connection(_) | DomainError::Transaction(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "database error",
                "code": "DATABASE_ERROR",
            }),
        ),
        DomainError::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            json!({
                "error": "request timed out",
                "code": "REQUEST_TIMEOUT",
            }),
        ),
        DomainError::Unknown(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "internal server error",
                "code": "INTERNAL_ERROR",
            }),
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
