//! HTTP application wiring (axum router + middleware stack).
//!
//! Layout:
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: domain error to HTTP response mapping

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use memberhub_auth::AccessLevel;
use memberhub_infra::{AuditStore, FlagStore, ResourceDirectory};

use crate::audit::AuditRecorder;
use crate::authz::{AuthorizationEngine, PermissionPolicy};
use crate::config::ApiConfig;
use crate::middleware::{
    AuditState, AuthState, PermissionState, TimeoutState, audit_capture, require_auth,
    require_permission, request_timeout,
};
use crate::session::SessionValidator;

pub mod dto;
pub mod errors;
pub mod routes;

/// Store handles shared by the route handlers.
pub struct AppServices {
    pub flags: Arc<dyn FlagStore>,
    pub audits: Arc<dyn AuditStore>,
    pub resources: Arc<dyn ResourceDirectory>,
}

/// Everything the app needs, injected by the caller. Tests pass in-memory
/// stores; `main.rs` passes Postgres-backed ones.
pub struct AppDeps {
    pub flags: Arc<dyn FlagStore>,
    pub audits: Arc<dyn AuditStore>,
    pub resources: Arc<dyn ResourceDirectory>,
    pub sessions: Arc<dyn SessionValidator>,
    pub config: ApiConfig,
}

/// Build the full HTTP router. The returned [`AuditRecorder`] must be shut
/// down after the server exits so enqueued audit entries are flushed.
pub fn build_app(deps: AppDeps) -> (Router, AuditRecorder) {
    let engine = AuthorizationEngine::new(deps.flags.clone(), deps.resources.clone());
    let recorder = AuditRecorder::spawn(deps.audits.clone());
    let services = Arc::new(AppServices {
        flags: deps.flags,
        audits: deps.audits,
        resources: deps.resources,
    });

    let prefix = deps.config.audit.api_prefix.clone();
    let perm = |policy: PermissionPolicy| {
        axum::middleware::from_fn_with_state(
            PermissionState {
                engine: engine.clone(),
                policy: Arc::new(policy),
                api_prefix: prefix.clone(),
            },
            require_permission,
        )
    };

    let flag_admin = routes::flags::router(&prefix).route_layer(perm(
        PermissionPolicy::MinimumLevel {
            action: "flags.admin",
            minimum: AccessLevel::Admin,
        },
    ));
    let audit_read = routes::audit::router(&prefix).route_layer(perm(
        PermissionPolicy::MinimumLevel {
            action: "audit.read",
            minimum: AccessLevel::Admin,
        },
    ));

    let protected = flag_admin
        .merge(audit_read)
        .layer(Extension(services))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthState {
                sessions: deps.sessions,
            },
            require_auth,
        ));

    // Outermost first: tracing, then audit capture (so 504s are observed
    // but suppressed by status), then the request deadline.
    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    AuditState {
                        recorder: recorder.clone(),
                        config: deps.config.audit,
                    },
                    audit_capture,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    TimeoutState {
                        deadline: deps.config.request_timeout,
                    },
                    request_timeout,
                )),
        );

    (app, recorder)
}
