//! Route-level guards for the HTTP surface.
//!
//! Administrative endpoints do not carry their own role lists: they ask the
//! same route policy that guards UI navigation, so the two cannot drift.

use thiserror::Error;

use schoolgate_auth::{ResolvedIdentity, RouteDecision, RoutePolicy};

/// Surface whose policy entry guards the approval endpoints.
pub const APPROVALS_SURFACE: &str = "/approvals";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Allow the request only if the policy would render `surface` for this identity.
pub fn require_surface(
    policy: &RoutePolicy,
    resolved: &ResolvedIdentity,
    surface: &str,
) -> Result<(), AuthzError> {
    let explanation = policy.explain(resolved, surface);
    match explanation.decision {
        RouteDecision::Render => Ok(()),
        _ if matches!(resolved, ResolvedIdentity::Unauthenticated) => Err(AuthzError::Unauthenticated),
        _ => Err(AuthzError::Forbidden(explanation.reason)),
    }
}
