use axum::{routing::{get, post}, Router};

pub mod approvals;
pub mod onboarding;
pub mod session;
pub mod system;

/// Router for every endpoint that runs behind session resolution.
pub fn router() -> Router {
    Router::new()
        .route("/session/identity", get(session::identity))
        .route("/session/route", get(session::route))
        .route("/onboarding/teacher", post(onboarding::submit_teacher))
        .nest("/approvals", approvals::router())
}
