use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use schoolgate_core::UserId;

use crate::{Email, Identity};

/// Claims carried by a session token from the external auth provider.
///
/// Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: String,

    /// Email the session was issued for.
    pub email: String,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed session claims: {0}")]
    Malformed(String),
}

/// Check the token's time window at `now` and extract the principal.
///
/// The signature must already have been verified by the caller.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<Identity, ClaimsError> {
    if claims.exp <= claims.iat {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(ClaimsError::Expired);
    }

    let id = UserId::new(claims.sub.as_str()).map_err(|e| ClaimsError::Malformed(e.to_string()))?;
    let email = Email::parse(&claims.email).map_err(|e| ClaimsError::Malformed(e.to_string()))?;
    Ok(Identity::new(id, email))
}
