use axum::http::StatusCode;
use serde::Deserialize;

use schoolgate_auth::{ApprovalStatus, TeacherProfile};
use schoolgate_core::RequestId;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    /// Missing and blank are both rejected by the workflow.
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListApprovalsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct TeacherOnboardingRequest {
    pub fullname: String,
    pub avatar_url: Option<String>,
    pub department: Option<String>,
    pub qualifications: Option<String>,
}

impl From<TeacherOnboardingRequest> for TeacherProfile {
    fn from(body: TeacherOnboardingRequest) -> Self {
        TeacherProfile {
            fullname: body.fullname,
            avatar_url: body.avatar_url,
            department: body.department,
            qualifications: body.qualifications,
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_status(raw: Option<&str>) -> Result<Option<ApprovalStatus>, axum::response::Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.to_lowercase().parse::<ApprovalStatus>().map(Some).map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "status must be one of: pending, approved, rejected",
            )
        }),
    }
}

pub fn parse_request_id(raw: &str) -> Result<RequestId, axum::response::Response> {
    raw.parse::<RequestId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
