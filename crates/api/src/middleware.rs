//! Request middleware: authentication, permission enforcement, audit
//! capture, request timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use memberhub_auth::Session;
use memberhub_core::{AuthenticationReason, DomainError};

use crate::app::errors::ApiError;
use crate::audit::{AuditRecorder, RequestMeta, build_entry, should_record};
use crate::authz::{AuthorizationEngine, PermissionPolicy};
use crate::classify::classify;
use crate::config::AuditConfig;

/// Request bodies above this size are served but not snapshotted for audit.
const MAX_AUDITED_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn crate::session::SessionValidator>,
}

/// Require a live session. Populates the request (and response) extensions
/// with the [`Session`] for downstream layers.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;
    let session = state.sessions.validate(token).await?;

    if session.is_expired(Utc::now()) {
        return Err(DomainError::Authentication(AuthenticationReason::Expired).into());
    }

    req.extensions_mut().insert(session.clone());
    let mut res = next.run(req).await;
    // The audit layer sits outside this one and reads the session from the
    // response extensions.
    res.extensions_mut().insert(session);
    Ok(res)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || DomainError::Authentication(AuthenticationReason::Missing);

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing().into());
    }
    Ok(token)
}

#[derive(Clone)]
pub struct PermissionState {
    pub engine: AuthorizationEngine,
    pub policy: Arc<PermissionPolicy>,
    pub api_prefix: String,
}

/// Enforce one [`PermissionPolicy`] for every request on a route group.
pub async fn require_permission(
    State(state): State<PermissionState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let route = classify(req.uri().path(), req.method(), &state.api_prefix);
    let session = req.extensions().get::<Session>();

    state
        .engine
        .authorize(session, &state.policy, &route, Utc::now())
        .await?;

    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AuditState {
    pub recorder: AuditRecorder,
    pub config: AuditConfig,
}

/// Observe every request and enqueue an audit entry for the ones that
/// qualify. Never fails the request.
pub async fn audit_capture(
    State(state): State<AuditState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = classify(&path, &method, &state.config.api_prefix);
    let meta = request_meta(req.headers());

    // Mutation payloads are snapshotted before the handler consumes them.
    // Oversized or unknown-length bodies pass through untouched, they are
    // just not snapshotted.
    let (req, payload) = if route.action.captures_payload() && body_is_bufferable(req.headers()) {
        buffer_json_body(req).await
    } else {
        (req, None)
    };

    let res = next.run(req).await;

    let status = res.status();
    if should_record(&state.config, &route, &path, status) {
        let session = res.extensions().get::<Session>();
        state.recorder.record(build_entry(
            &route,
            session,
            &meta,
            method.as_str(),
            &path,
            status,
            payload,
        ));
    }

    res
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RequestMeta {
        // First hop of x-forwarded-for when present.
        ip: header("x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty()),
        user_agent: header("user-agent"),
        referer: header("referer"),
    }
}

/// A body is only buffered when its length is declared and within the cap.
/// Chunked bodies have no declared length; buffering one past the cap would
/// truncate what the handler sees, so they are never snapshotted.
fn body_is_bufferable(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= MAX_AUDITED_BODY_BYTES)
}

/// Buffer the request body and parse it as JSON for the audit snapshot. The
/// original bytes are put back so extractors downstream still see them.
/// Non-JSON bodies are served without a snapshot.
async fn buffer_json_body(req: Request<Body>) -> (Request<Body>, Option<serde_json::Value>) {
    let (parts, body) = req.into_parts();
    match axum::body::to_bytes(body, MAX_AUDITED_BODY_BYTES).await {
        Ok(bytes) => {
            let payload = serde_json::from_slice(&bytes).ok();
            (Request::from_parts(parts, Body::from(bytes)), payload)
        }
        Err(err) => {
            tracing::warn!(error = %err, "request body not buffered, audit snapshot skipped");
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

#[derive(Clone)]
pub struct TimeoutState {
    pub deadline: Duration,
}

/// Cut off requests that exceed the configured deadline with a 504.
pub async fn request_timeout(
    State(state): State<TimeoutState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match tokio::time::timeout(state.deadline, next.run(req)).await {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!("request deadline elapsed");
            ApiError(DomainError::Timeout).into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
