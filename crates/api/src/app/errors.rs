use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use schoolgate_infra::{GatewayError, StoreError};

use crate::authz::AuthzError;

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    let code = err.code();
    match err {
        GatewayError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        GatewayError::ApprovalNotFound(_) => json_error(StatusCode::NOT_FOUND, code, err.to_string()),
        GatewayError::AlreadyDecided { .. } => json_error(StatusCode::CONFLICT, code, err.to_string()),
        GatewayError::PartialFailure {
            request_id,
            status,
            stage,
            ..
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": code,
                "message": err.to_string(),
                "request_id": request_id,
                "status": status,
                "stage": stage,
            })),
        )
            .into_response(),
        GatewayError::Store(StoreError::Unavailable(_))
        | GatewayError::AuthUnavailable(_)
        | GatewayError::RoleLookup(_) => json_error(StatusCode::SERVICE_UNAVAILABLE, code, err.to_string()),
        GatewayError::Store(StoreError::Conflict(_)) => json_error(StatusCode::CONFLICT, code, err.to_string()),
        GatewayError::Store(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string()),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthenticated => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string()),
        AuthzError::Forbidden(reason) => json_error(StatusCode::FORBIDDEN, "forbidden", reason),
    }
}

/// Malformed or missing JSON bodies, in the same `{error, message}` shape.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(rejection.status(), "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
