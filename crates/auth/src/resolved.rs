use serde::Serialize;

use crate::{ApprovalStatus, RoleRecord, Role};

/// Result of identity resolution for one navigation.
///
/// Created fresh on every resolution and passed down explicitly; it is never
/// cached beyond the request that computed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolvedIdentity {
    /// No session (or the session source failed; fail closed).
    Unauthenticated,
    /// A role record granted exactly this role.
    RoleResolved { role: Role, data: RoleRecord },
    /// A teacher awaiting sign-off; carries the request status verbatim.
    PendingApproval { status: ApprovalStatus },
    /// Authenticated, but no role record or approval request yet.
    NewUnregistered,
    /// Resolution has not completed yet.
    Loading,
    /// A store fault interrupted resolution. Never grants access.
    ResolutionError { message: String },
}

impl ResolvedIdentity {
    pub fn role(&self) -> Option<Role> {
        match self {
            ResolvedIdentity::RoleResolved { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&RoleRecord> {
        match self {
            ResolvedIdentity::RoleResolved { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedIdentity::Unauthenticated => "unauthenticated",
            ResolvedIdentity::RoleResolved { .. } => "role_resolved",
            ResolvedIdentity::PendingApproval { .. } => "pending_approval",
            ResolvedIdentity::NewUnregistered => "new_unregistered",
            ResolvedIdentity::Loading => "loading",
            ResolvedIdentity::ResolutionError { .. } => "resolution_error",
        }
    }
}
