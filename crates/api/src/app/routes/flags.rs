//! Flag administration endpoints: definitions and per-member grants.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::Utc;
use serde_json::json;

use memberhub_auth::{FlagCategory, FlagDefinition, FlagGrant, FlagId, Session};
use memberhub_core::{DomainError, EntityId, SubjectId};

use crate::app::AppServices;
use crate::app::dto::{DefineFlagRequest, GrantFlagRequest, RevokeFlagQuery};
use crate::app::errors::ApiError;

/// Routes are declared with the full API prefix so the permission and audit
/// layers see the same paths the classifier does.
pub fn router(prefix: &str) -> Router {
    Router::new()
        .route(
            &format!("{prefix}/flags"),
            get(list_definitions).post(define_flag),
        )
        .route(
            &format!("{prefix}/members/:id/flags"),
            get(list_member_flags).post(grant_flag),
        )
        .route(
            &format!("{prefix}/members/:id/flags/:flag_id"),
            delete(revoke_flag),
        )
}

/// GET /api/flags
pub async fn list_definitions(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let definitions = services.flags.definitions().await?;
    Ok(Json(json!({ "flags": definitions })))
}

/// POST /api/flags
pub async fn define_flag(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DefineFlagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = body.id.trim();
    if id.is_empty() {
        return Err(DomainError::validation("flag id must not be empty").into());
    }
    if body.name.trim().is_empty() {
        return Err(DomainError::validation("flag name must not be empty").into());
    }

    let definition = FlagDefinition {
        id: FlagId::new(id.to_string()),
        name: body.name,
        description: body.description,
        category: body
            .category
            .as_deref()
            .map(FlagCategory::parse)
            .unwrap_or(FlagCategory::Other),
    };
    services.flags.define(definition.clone()).await?;

    Ok((StatusCode::CREATED, Json(json!({ "flag": definition }))))
}

/// GET /api/members/:id/flags
pub async fn list_member_flags(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_member_exists(&services, id).await?;

    let now = Utc::now();
    let active = services
        .flags
        .list_for_subject(SubjectId::new(id), now)
        .await?;
    let mut flags: Vec<String> = active.iter().map(|f| f.as_str().to_string()).collect();
    flags.sort();

    Ok(Json(json!({ "member_id": id, "active_flags": flags })))
}

/// POST /api/members/:id/flags
pub async fn grant_flag(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    Json(body): Json<GrantFlagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_member_exists(&services, id).await?;

    let now = Utc::now();
    let flag_id = FlagId::new(body.flag_id.clone());

    if services.flags.definition(&flag_id).await?.is_none() {
        return Err(DomainError::flag_not_found(format!("flag {flag_id} is not defined")).into());
    }
    if let Some(expires_at) = body.expires_at {
        if expires_at <= now {
            return Err(DomainError::flag_invalid("expiry must be in the future").into());
        }
    }

    let grant = FlagGrant {
        subject_id: SubjectId::new(id),
        flag_id,
        granted_at: now,
        granted_by: session.user_id.clone(),
        expires_at: body.expires_at,
        metadata: body.metadata.unwrap_or_else(|| json!({})),
    };
    services.flags.grant(grant.clone()).await?;

    Ok((StatusCode::CREATED, Json(json!({ "grant": grant }))))
}

/// DELETE /api/members/:id/flags/:flag_id
pub async fn revoke_flag(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, flag_id)): Path<(i64, String)>,
    Query(query): Query<RevokeFlagQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_member_exists(&services, id).await?;

    // Revoking an absent grant is a no-op, so this is idempotent.
    services
        .flags
        .revoke(
            SubjectId::new(id),
            &FlagId::new(flag_id),
            query.reason.as_deref(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_member_exists(services: &AppServices, id: i64) -> Result<(), ApiError> {
    if !services.resources.exists("member", EntityId::new(id)).await? {
        return Err(DomainError::not_found("member", Some(id)).into());
    }
    Ok(())
}
