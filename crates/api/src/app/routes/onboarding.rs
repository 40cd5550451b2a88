use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::{dto::TeacherOnboardingRequest, errors, services::AppServices};
use crate::authz::AuthzError;
use crate::context::SessionContext;

/// POST /onboarding/teacher - submit a teacher registration for approval
pub async fn submit_teacher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    body: Result<Json<TeacherOnboardingRequest>, JsonRejection>,
) -> axum::response::Response {
    let Some(identity) = session.identity() else {
        return errors::authz_error_to_response(AuthzError::Unauthenticated);
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.gateway.submit_registration(identity, body.into()).await {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}
