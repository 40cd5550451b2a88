//! Identity resolution: principal → `ResolvedIdentity`.
//!
//! Role tables are probed in a fixed priority order and the first match wins,
//! so an email present in several tables still resolves deterministically.
//! Nothing is cached; every call reads the stores afresh.

use std::sync::Arc;

use tracing::{debug, error, warn};

use schoolgate_auth::{ApprovalStatus, Identity, ResolvedIdentity, Role};

use crate::error::GatewayError;
use crate::store::{ApprovalStore, RoleStore, SessionSource};

/// Probe order, highest privilege first.
pub const PROBE_ORDER: [(&str, Role); 4] = [
    ("admins", Role::Admin),
    ("hods", Role::Hod),
    ("teachers", Role::Teacher),
    ("students", Role::Student),
];

#[derive(Clone)]
pub struct IdentityResolver {
    roles: Arc<dyn RoleStore>,
    approvals: Arc<dyn ApprovalStore>,
}

impl IdentityResolver {
    pub fn new(roles: Arc<dyn RoleStore>, approvals: Arc<dyn ApprovalStore>) -> Self {
        Self { roles, approvals }
    }

    /// Resolve an (optional) principal. Store faults become `ResolutionError`.
    pub async fn resolve(&self, identity: Option<&Identity>) -> ResolvedIdentity {
        let Some(identity) = identity else {
            return ResolvedIdentity::Unauthenticated;
        };

        match self.try_resolve(identity).await {
            Ok(resolved) => {
                debug!(email = %identity.email, state = resolved.kind(), "identity resolved");
                resolved
            }
            Err(err) => {
                error!(email = %identity.email, error = %err, "identity resolution failed");
                ResolvedIdentity::ResolutionError {
                    message: err.to_string(),
                }
            }
        }
    }

    /// Ask the session source for the principal, then resolve it.
    ///
    /// A failing session source is treated as "no session".
    pub async fn resolve_current(&self, session: &dyn SessionSource) -> ResolvedIdentity {
        match session.current_identity().await {
            Ok(identity) => self.resolve(identity.as_ref()).await,
            Err(err) => {
                let err = GatewayError::AuthUnavailable(err);
                warn!(error = %err, "session source failed; treating caller as unauthenticated");
                ResolvedIdentity::Unauthenticated
            }
        }
    }

    async fn try_resolve(&self, identity: &Identity) -> Result<ResolvedIdentity, GatewayError> {
        let email = &identity.email;
        let mut pending_teacher_seen = false;

        for (table, role) in PROBE_ORDER {
            let record = self
                .roles
                .find_role_record(role, email)
                .await
                .map_err(GatewayError::RoleLookup)?;

            let Some(record) = record else {
                debug!(%table, email = %email, "no role record");
                continue;
            };

            if role == Role::Teacher && !record.is_active_teacher() {
                debug!(%table, email = %email, "teacher record awaiting approval");
                pending_teacher_seen = true;
                continue;
            }

            return Ok(ResolvedIdentity::RoleResolved { role, data: record });
        }

        let request = self
            .approvals
            .find_by_email(email)
            .await
            .map_err(GatewayError::RoleLookup)?;

        Ok(match request {
            Some(request) => ResolvedIdentity::PendingApproval {
                status: request.status,
            },
            None if pending_teacher_seen => ResolvedIdentity::PendingApproval {
                status: ApprovalStatus::Pending,
            },
            None => ResolvedIdentity::NewUnregistered,
        })
    }
}
