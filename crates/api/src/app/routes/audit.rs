//! Audit trail query endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
};

use crate::app::AppServices;
use crate::app::dto::AuditQuery;
use crate::app::errors::ApiError;

pub fn router(prefix: &str) -> Router {
    Router::new().route(&format!("{prefix}/audit"), get(query_audit))
}

/// GET /api/audit
pub async fn query_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = services
        .audits
        .query(query.filter(), query.pagination())
        .await?;
    Ok(Json(page))
}
