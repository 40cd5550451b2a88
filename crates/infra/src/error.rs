use thiserror::Error;

use schoolgate_auth::{ApprovalStatus, ApprovalTransitionError};
use schoolgate_core::{DomainError, RequestId};

use crate::store::StoreError;

/// Errors surfaced by the gateway's operations.
///
/// `AuthUnavailable` and `RoleLookup` never reach route decisions directly: the
/// resolver folds them into `Unauthenticated` / `ResolutionError`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("session source unavailable: {0}")]
    AuthUnavailable(#[source] StoreError),

    #[error("role lookup failed: {0}")]
    RoleLookup(#[source] StoreError),

    #[error("approval request {0} not found")]
    ApprovalNotFound(RequestId),

    #[error("approval request {id} was already {status}")]
    AlreadyDecided { id: RequestId, status: ApprovalStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    /// A must-succeed step after the decision write failed. The decision stands.
    #[error("request {request_id} is {status} but {stage} failed: {source}")]
    PartialFailure {
        request_id: RequestId,
        status: ApprovalStatus,
        stage: &'static str,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthUnavailable(_) => "auth_unavailable",
            GatewayError::RoleLookup(_) => "role_lookup_failed",
            GatewayError::ApprovalNotFound(_) => "approval_not_found",
            GatewayError::AlreadyDecided { .. } => "already_decided",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::PartialFailure { .. } => "partial_failure",
            GatewayError::Store(_) => "store_error",
        }
    }
}

impl From<ApprovalTransitionError> for GatewayError {
    fn from(err: ApprovalTransitionError) -> Self {
        match err {
            ApprovalTransitionError::MissingReason => GatewayError::Validation(err.to_string()),
            ApprovalTransitionError::AlreadyDecided { id, status } => {
                GatewayError::AlreadyDecided { id, status }
            }
        }
    }
}

impl From<DomainError> for GatewayError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => GatewayError::Validation(msg),
            other => GatewayError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_map_to_gateway_taxonomy() {
        assert_eq!(
            GatewayError::from(ApprovalTransitionError::MissingReason).code(),
            "validation_error"
        );
        let err = GatewayError::from(ApprovalTransitionError::AlreadyDecided {
            id: RequestId::new(7),
            status: ApprovalStatus::Rejected,
        });
        assert_eq!(err.code(), "already_decided");
        assert_eq!(err.to_string(), "approval request 7 was already rejected");
    }

    #[test]
    fn partial_failure_message_names_the_stage() {
        let err = GatewayError::PartialFailure {
            request_id: RequestId::new(42),
            status: ApprovalStatus::Approved,
            stage: "teacher_activation",
            source: StoreError::Unavailable("timeout".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("approved"));
        assert!(msg.contains("teacher_activation"));
    }
}
