//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the gateway instance
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(jwt_secret: &str, services: services::AppServices) -> Router {
    let auth_state = middleware::AuthState::hs256(jwt_secret.as_bytes(), services.gateway.clone());
    let services = Arc::new(services);

    // Everything except health runs behind session resolution.
    let sessioned = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(sessioned)
        .layer(ServiceBuilder::new())
}
