use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::warn;

use schoolgate_auth::{Identity, SessionClaims, validate_claims};
use schoolgate_infra::AccessGateway;

use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    pub decoding_key: Arc<DecodingKey>,
    pub validation: Arc<Validation>,
    pub gateway: AccessGateway,
}

impl AuthState {
    /// HS256 verification with `secret`. Time checks are left to `validate_claims`.
    pub fn hs256(secret: &[u8], gateway: AccessGateway) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
            gateway,
        }
    }

    /// Verify and validate a bearer token.
    pub fn identify(&self, token: &str) -> Result<Identity, String> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| e.to_string())?;
        validate_claims(&data.claims, Utc::now()).map_err(|e| e.to_string())
    }
}

/// Attach the session and its resolved identity to the request.
///
/// Never rejects: a missing header is an anonymous session, and an invalid
/// token is treated the same way (logged). Route-level guards decide what an
/// anonymous caller may see.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let identity = match extract_bearer(req.headers()) {
        Ok(None) => None,
        Ok(Some(token)) => match state.identify(token) {
            Ok(identity) => Some(identity),
            Err(reason) => {
                warn!(%reason, "rejected session token; continuing unauthenticated");
                None
            }
        },
        Err(reason) => {
            warn!(%reason, "malformed authorization header; continuing unauthenticated");
            None
        }
    };

    let session = SessionContext::new(identity);
    let resolved = state.gateway.resolve_identity(&session).await;

    req.extensions_mut().insert(session);
    req.extensions_mut().insert(resolved);

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| "authorization header is not ascii")?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or("authorization header is not a bearer token")?
        .trim();
    if token.is_empty() {
        return Err("empty bearer token");
    }

    Ok(Some(token))
}
