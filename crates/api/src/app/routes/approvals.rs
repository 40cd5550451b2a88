//! Teacher approval queue and decisions (HOD/Admin only).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use schoolgate_auth::ResolvedIdentity;
use schoolgate_core::UserId;

use crate::app::{
    dto::{self, ListApprovalsQuery, RejectRequest},
    errors,
    services::AppServices,
};
use crate::authz::{self, AuthzError, APPROVALS_SURFACE};
use crate::context::SessionContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_requests))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/activation", post(retry_activation))
}

// ─────────────────────────────────────────────────────────────────────────────
// Guard
// ─────────────────────────────────────────────────────────────────────────────

/// The deciding principal, if the policy lets this caller onto the approvals surface.
fn decider(
    services: &AppServices,
    session: &SessionContext,
    resolved: &ResolvedIdentity,
) -> Result<UserId, axum::response::Response> {
    authz::require_surface(services.gateway.policy(), resolved, APPROVALS_SURFACE)
        .map_err(errors::authz_error_to_response)?;

    session
        .identity()
        .map(|identity| identity.id.clone())
        .ok_or_else(|| errors::authz_error_to_response(AuthzError::Unauthenticated))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /approvals?status=pending - approval queue, newest first
pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Extension(resolved): Extension<ResolvedIdentity>,
    Query(query): Query<ListApprovalsQuery>,
) -> axum::response::Response {
    if let Err(resp) = decider(&services, &session, &resolved) {
        return resp;
    }
    let status = match dto::parse_status(query.status.as_deref()) {
        Ok(status) => status,
        Err(resp) => return resp,
    };

    match services.gateway.list_requests(status).await {
        Ok(requests) => Json(requests).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// POST /approvals/:id/approve
pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Extension(resolved): Extension<ResolvedIdentity>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let decider = match decider(&services, &session, &resolved) {
        Ok(decider) => decider,
        Err(resp) => return resp,
    };
    let id = match dto::parse_request_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.gateway.approve_teacher(id, &decider).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// POST /approvals/:id/reject - body: { "reason": "..." }
pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Extension(resolved): Extension<ResolvedIdentity>,
    Path(id): Path<String>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> axum::response::Response {
    let decider = match decider(&services, &session, &resolved) {
        Ok(decider) => decider,
        Err(resp) => return resp,
    };
    let id = match dto::parse_request_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services
        .gateway
        .reject_teacher(id, &decider, &body.reason)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// POST /approvals/:id/activation - retry teacher activation after a partial failure
pub async fn retry_activation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Extension(resolved): Extension<ResolvedIdentity>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = decider(&services, &session, &resolved) {
        return resp;
    }
    let id = match dto::parse_request_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.gateway.retry_activation(id).await {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}
