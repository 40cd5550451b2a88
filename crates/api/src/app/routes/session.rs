use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    Json,
};

use schoolgate_auth::ResolvedIdentity;

use crate::app::{dto::RouteQuery, services::AppServices};

/// GET /session/identity - the caller's resolved identity
pub async fn identity(Extension(resolved): Extension<ResolvedIdentity>) -> impl IntoResponse {
    Json(resolved)
}

/// GET /session/route?path=... - what navigating to `path` would do, and why
pub async fn route(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(resolved): Extension<ResolvedIdentity>,
    Query(query): Query<RouteQuery>,
) -> impl IntoResponse {
    Json(services.gateway.explain_route(&resolved, &query.path))
}
