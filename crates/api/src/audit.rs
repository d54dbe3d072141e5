//! Audit recording.
//!
//! Entries are built on the request path but written by a dedicated task so
//! the response never waits on the audit insert. Write failures are logged
//! and swallowed; auditing must not break serving. Shutdown drains every
//! entry already enqueued before the writer exits.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use memberhub_auth::Session;
use memberhub_infra::{AuditEntry, AuditStore};

use crate::classify::RouteClass;
use crate::config::AuditConfig;

/// Request metadata captured for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

enum AuditMsg {
    Entry(AuditEntry),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the background audit writer. Cheap to clone.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::UnboundedSender<AuditMsg>,
}

impl AuditRecorder {
    /// Spawn the writer task over `store`.
    pub fn spawn(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    AuditMsg::Entry(entry) => {
                        if let Err(err) = store.append(entry).await {
                            tracing::error!(error = %err, "audit write failed, entry dropped");
                        }
                    }
                    AuditMsg::Shutdown(done) => {
                        // The channel is FIFO: every entry enqueued before
                        // this message has already been written.
                        let _ = done.send(());
                        break;
                    }
                }
            }
        });
        Self { tx }
    }

    /// Enqueue one entry. Never blocks and never fails the request.
    pub fn record(&self, entry: AuditEntry) {
        if self.tx.send(AuditMsg::Entry(entry)).is_err() {
            tracing::error!("audit writer gone, entry dropped");
        }
    }

    /// Flush all enqueued entries and stop the writer.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditMsg::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Whether a finished request should be recorded at all.
pub fn should_record(
    config: &AuditConfig,
    route: &RouteClass,
    path: &str,
    status: StatusCode,
) -> bool {
    if !path.starts_with(&config.api_prefix) {
        return false;
    }
    if path.starts_with(&config.auth_prefix) {
        return false;
    }
    if route.entity_type.is_empty() || route.action == memberhub_core::Action::Unknown {
        return false;
    }
    if config.is_denied(&route.entity_type, route.action) {
        return false;
    }
    // Only successful outcomes are recorded; 4xx/5xx would flood the trail.
    status.is_success() || status.is_redirection()
}

/// Build the audit entry for one finished request.
pub fn build_entry(
    route: &RouteClass,
    session: Option<&Session>,
    meta: &RequestMeta,
    method: &str,
    path: &str,
    status: StatusCode,
    payload: Option<serde_json::Value>,
) -> AuditEntry {
    AuditEntry {
        entity_type: route.entity_type.clone(),
        entity_id: route.entity_id,
        action: route.action,
        user_session_id: session.map(|s| s.session_id.as_str().to_string()),
        user_id: session.map(|s| s.user_id.as_str().to_string()),
        user_ip: meta.ip.clone(),
        new_values: if route.action.captures_payload() {
            payload
        } else {
            None
        },
        // Before-images are not captured; the column stays null.
        old_values: None,
        metadata: serde_json::json!({
            "user_agent": meta.user_agent,
            "referer": meta.referer,
            "method": method,
            "path": path,
            "status_code": status.as_u16(),
        }),
        created_at: Utc::now(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
