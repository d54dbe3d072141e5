//! Black-box tests against the real router over HTTP, with in-memory stores
//! injected in place of Postgres.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use memberhub_api::app::{AppDeps, build_app};
use memberhub_api::audit::AuditRecorder;
use memberhub_api::config::ApiConfig;
use memberhub_api::session::{Hs256SessionValidator, SessionTokenClaims};
use memberhub_core::{Action, EntityId};
use memberhub_infra::{
    InMemoryAuditStore, InMemoryFlagStore, InMemoryResourceDirectory,
};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    audits: Arc<InMemoryAuditStore>,
    recorder: AuditRecorder,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let flags = Arc::new(InMemoryFlagStore::new());
        let audits = Arc::new(InMemoryAuditStore::new());
        let resources = Arc::new(InMemoryResourceDirectory::new());
        // One known member row; everything else is a 404.
        resources.insert("member", EntityId::new(42), 0);

        let deps = AppDeps {
            flags: flags.clone(),
            audits: audits.clone(),
            resources,
            sessions: Arc::new(Hs256SessionValidator::new(SECRET.as_bytes())),
            config: ApiConfig::default(),
        };
        let (app, recorder) = build_app(deps);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            audits,
            recorder,
            handle,
        }
    }

    /// Poll until the background audit writer has caught up to `predicate`.
    async fn wait_for_audit(
        &self,
        predicate: impl Fn(&memberhub_infra::AuditEntry) -> bool,
    ) -> memberhub_infra::AuditEntry {
        for _ in 0..100 {
            if let Some(entry) = self.audits.all().into_iter().find(|e| predicate(e)) {
                return entry;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected audit entry was not written within timeout");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_token(level: i64, expires_in_minutes: i64) -> String {
    let claims = SessionTokenClaims {
        sid: "sess-test".to_string(),
        sub: "user-test".to_string(),
        email: "tester@example.com".to_string(),
        name: "Tester".to_string(),
        level,
        exp: (Utc::now() + ChronoDuration::minutes(expires_in_minutes)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode token")
}

fn admin_token() -> String {
    mint_token(2, 10)
}

async fn define_flag(srv: &TestServer, client: &reqwest::Client, id: &str) {
    let res = client
        .post(format!("{}/api/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "id": id, "name": id, "category": "verification" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/flags", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/flags", srv.base_url))
        .bearer_auth(mint_token(2, -10))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn insufficient_level_is_forbidden_with_diagnostics() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Moderator (level 1) against an admin-only surface.
    let res = client
        .get(format!("{}/api/audit", srv.base_url))
        .bearer_auth(mint_token(1, 10))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "PERMISSION_DENIED");
    assert!(
        body["required_permission"]
            .as_str()
            .unwrap()
            .contains("audit.read")
    );
}

#[tokio::test]
async fn flag_grant_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    define_flag(&srv, &client, "identity_verified").await;

    // Duplicate definition conflicts.
    let res = client
        .post(format!("{}/api/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "id": "identity_verified", "name": "again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "UNIQUE_CONSTRAINT_VIOLATION");

    // Grant to the known member.
    let res = client
        .post(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "flag_id": "identity_verified" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["active_flags"], json!(["identity_verified"]));

    // Revoke, then the listing is empty. Revoking again stays 204.
    for _ in 0..2 {
        let res = client
            .delete(format!(
                "{}/api/members/42/flags/identity_verified?reason=test",
                srv.base_url
            ))
            .bearer_auth(admin_token())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    let res = client
        .get(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["active_flags"], json!([]));
}

#[tokio::test]
async fn grant_validations_map_to_the_error_table() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Unknown flag id.
    let res = client
        .post(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "flag_id": "no_such_flag" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "FLAG_NOT_FOUND");

    // Unknown member: 404 with the resource named, not a 403.
    define_flag(&srv, &client, "paid_member").await;
    let res = client
        .post(format!("{}/api/members/999/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "flag_id": "paid_member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["resource"]["type"], "member");

    // Expiry in the past.
    let res = client
        .post(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({
            "flag_id": "paid_member",
            "expires_at": Utc::now() - ChronoDuration::hours(1),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "FLAG_VALIDATION_ERROR");
}

#[tokio::test]
async fn successful_creates_are_audited_with_the_payload() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let payload = json!({ "id": "board_member", "name": "Board member" });
    let res = client
        .post(format!("{}/api/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let entry = srv
        .wait_for_audit(|e| e.entity_type == "flag" && e.action == Action::Create)
        .await;
    assert_eq!(entry.new_values, Some(payload));
    assert_eq!(entry.old_values, None);
    assert_eq!(entry.user_id.as_deref(), Some("user-test"));
    assert_eq!(entry.metadata["status_code"], 201);
    assert_eq!(entry.metadata["path"], "/api/flags");
}

#[tokio::test]
async fn grants_are_audited_against_the_member() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    define_flag(&srv, &client, "identity_verified").await;

    let res = client
        .post(format!("{}/api/members/42/flags", srv.base_url))
        .bearer_auth(admin_token())
        .json(&json!({ "flag_id": "identity_verified" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let entry = srv
        .wait_for_audit(|e| e.entity_type == "member" && e.action == Action::Create)
        .await;
    assert_eq!(entry.entity_id, Some(42));
}

#[tokio::test]
async fn failures_and_denied_pairs_are_not_audited() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // A forbidden request (moderator against admin surface).
    let res = client
        .get(format!("{}/api/audit", srv.base_url))
        .bearer_auth(mint_token(1, 10))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // A successful audit read, which is on the deny list.
    let res = client
        .get(format!("{}/api/audit", srv.base_url))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Drive one recordable request through, then confirm it is the only one.
    define_flag(&srv, &client, "identity_verified").await;
    srv.wait_for_audit(|e| e.entity_type == "flag").await;
    assert_eq!(srv.audits.all().len(), 1);
}

#[tokio::test]
async fn audit_endpoint_filters_and_paginates() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    define_flag(&srv, &client, "flag_a").await;
    define_flag(&srv, &client, "flag_b").await;
    srv.wait_for_audit(|e| {
        e.new_values
            .as_ref()
            .is_some_and(|v| v["id"] == "flag_b")
    })
    .await;

    let res = client
        .get(format!(
            "{}/api/audit?entity_type=flag&action=create&limit=1",
            srv.base_url
        ))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], true);
    // Newest first.
    assert_eq!(body["entries"][0]["new_values"]["id"], "flag_b");

    let res = client
        .get(format!(
            "{}/api/audit?entity_type=member",
            srv.base_url
        ))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn shutdown_drains_the_audit_queue() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    define_flag(&srv, &client, "identity_verified").await;
    srv.recorder.shutdown().await;

    assert_eq!(srv.audits.all().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Request deadlines, through the same audit + timeout stack build_app wires.
// ─────────────────────────────────────────────────────────────────────────────

mod deadlines {
    use super::*;
    use axum::{Router, routing::post};
    use memberhub_api::config::AuditConfig;
    use memberhub_api::middleware::{
        AuditState, TimeoutState, audit_capture, request_timeout,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn elapsed_deadline_is_a_504_and_is_not_audited() {
        let audits = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::spawn(audits.clone());

        let app = Router::new()
            .route(
                "/api/events",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "done"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                TimeoutState {
                    deadline: Duration::from_millis(50),
                },
                request_timeout,
            ))
            .layer(axum::middleware::from_fn_with_state(
                AuditState {
                    recorder: recorder.clone(),
                    config: AuditConfig::default(),
                },
                audit_capture,
            ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let res = client
            .post(format!("http://{addr}/api/events"))
            .json(&json!({ "name": "Spring Gala" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["code"], "REQUEST_TIMEOUT");

        // 504 is outside the recorded status window.
        recorder.shutdown().await;
        assert!(audits.all().is_empty());

        handle.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource-flag gating, using the exported middleware the way an embedding
// CRUD router would.
// ─────────────────────────────────────────────────────────────────────────────

mod resource_gating {
    use super::*;
    use axum::{Router, routing::get};
    use memberhub_api::authz::{AuthorizationEngine, PermissionPolicy};
    use memberhub_api::middleware::{
        AuthState, PermissionState, require_auth, require_permission,
    };
    use memberhub_auth::{FlagCategory, FlagDefinition, FlagGrant, FlagId};
    use memberhub_core::{ActorId, SubjectId};
    use memberhub_infra::FlagStore;

    async fn spawn_gated_route(
        flags: Arc<InMemoryFlagStore>,
        resources: Arc<InMemoryResourceDirectory>,
    ) -> (String, tokio::task::JoinHandle<()>) {
        let engine = AuthorizationEngine::new(flags, resources);
        let policy = PermissionPolicy::ResourceFlags {
            resource_type: "member",
            required: vec![FlagId::new("identity_verified")],
        };

        let app = Router::new()
            .route("/api/members/:id", get(|| async { "profile" }))
            .route_layer(axum::middleware::from_fn_with_state(
                PermissionState {
                    engine,
                    policy: Arc::new(policy),
                    api_prefix: "/api".to_string(),
                },
                require_permission,
            ))
            .route_layer(axum::middleware::from_fn_with_state(
                AuthState {
                    sessions: Arc::new(Hs256SessionValidator::new(SECRET.as_bytes())),
                },
                require_auth,
            ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn route_is_gated_on_the_member_flag() {
        let flags = Arc::new(InMemoryFlagStore::new());
        let resources = Arc::new(InMemoryResourceDirectory::new());
        resources.insert("member", EntityId::new(42), 0);
        flags
            .define(FlagDefinition {
                id: FlagId::new("identity_verified"),
                name: "Identity verified".to_string(),
                description: None,
                category: FlagCategory::Verification,
            })
            .await
            .unwrap();

        let (base_url, handle) = spawn_gated_route(flags.clone(), resources).await;
        let client = reqwest::Client::new();

        // No grant yet: denied, naming the missing flag and the resource.
        let res = client
            .get(format!("{base_url}/api/members/42"))
            .bearer_auth(mint_token(0, 10))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["required_permission"], "identity_verified");
        assert_eq!(body["resource"], "member/42");

        // Unknown member: 404, not 403.
        let res = client
            .get(format!("{base_url}/api/members/999"))
            .bearer_auth(mint_token(0, 10))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        // Grant the flag; access level stays at member, only the flag decides.
        flags
            .grant(FlagGrant {
                subject_id: SubjectId::new(42),
                flag_id: FlagId::new("identity_verified"),
                granted_at: Utc::now(),
                granted_by: ActorId::new("admin-1"),
                expires_at: None,
                metadata: json!({}),
            })
            .await
            .unwrap();

        let res = client
            .get(format!("{base_url}/api/members/42"))
            .bearer_auth(mint_token(0, 10))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        handle.abort();
    }
}
