//! Teacher approval workflow.
//!
//! Decisions run in two phases:
//!
//! 1. **must-succeed**: load the request, run the pure transition, then write
//!    to the role table and the approval table. Failures here are hard errors.
//! 2. **best-effort**: account deletion and the rejection notification.
//!    Failures are logged and returned as warnings; nothing is rolled back.
//!
//! Concurrency is guarded by the approval store alone: its conditional write
//! lets only one of two racing deciders win, and `create` refuses a second
//! pending request for the same email.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use schoolgate_auth::{
    ApprovalCommand, ApprovalDecision, ApprovalRequest, ApprovalStatus, Identity,
    NewApprovalRequest, Role, RoleRecord, TeacherProfile,
};
use schoolgate_core::{RequestId, UserId};

use crate::error::GatewayError;
use crate::resolver::PROBE_ORDER;
use crate::store::{
    AccountStore, ApprovalStore, Notification, NotificationKind, NotificationSink, RoleStore,
    StoreError,
};

/// Best-effort step that produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStep {
    AccountDeletion,
    Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupWarning {
    pub step: CleanupStep,
    pub message: String,
}

/// Result of a decision: the request as written plus any cleanup warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub request: ApprovalRequest,
    pub warnings: Vec<CleanupWarning>,
}

impl DecisionOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Clone)]
pub struct ApprovalWorkflow {
    roles: Arc<dyn RoleStore>,
    approvals: Arc<dyn ApprovalStore>,
    accounts: Arc<dyn AccountStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl ApprovalWorkflow {
    pub fn new(
        roles: Arc<dyn RoleStore>,
        approvals: Arc<dyn ApprovalStore>,
        accounts: Arc<dyn AccountStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            roles,
            approvals,
            accounts,
            notifications,
        }
    }

    /// Approve a pending request and activate the teacher.
    ///
    /// If activation fails after the decision is written, the request stays
    /// approved and `PartialFailure` is returned; `retry_activation` finishes it.
    pub async fn approve(&self, id: RequestId, decider: &UserId) -> Result<DecisionOutcome, GatewayError> {
        let request = self.load(id).await?;
        let decision = request.handle(&ApprovalCommand::Approve {
            decider: decider.clone(),
            occurred_at: Utc::now(),
        })?;

        let approved = self.record(&decision).await?;

        if let Err(source) = self.activate_teacher(&approved, &decision).await {
            error!(request_id = %id, email = %approved.teacher_email, error = %source, "teacher activation failed after approval");
            return Err(GatewayError::PartialFailure {
                request_id: id,
                status: approved.status,
                stage: "teacher_activation",
                source,
            });
        }

        info!(request_id = %id, decider = %decider, email = %approved.teacher_email, "teacher approved");
        Ok(DecisionOutcome {
            request: approved,
            warnings: Vec::new(),
        })
    }

    /// Reject a pending request, remove the teacher's role record and clean up.
    pub async fn reject(
        &self,
        id: RequestId,
        decider: &UserId,
        reason: &str,
    ) -> Result<DecisionOutcome, GatewayError> {
        // Checked before any lookup: a blank reason never touches the stores.
        if reason.trim().is_empty() {
            return Err(GatewayError::validation("a rejection reason is required"));
        }

        let request = self.load(id).await?;
        let decision = request.handle(&ApprovalCommand::Reject {
            decider: decider.clone(),
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        })?;

        // Phase 1: must succeed.
        let removed = self
            .roles
            .find_role_record(Role::Teacher, &request.teacher_email)
            .await?;
        self.roles
            .delete_role_record(Role::Teacher, &request.teacher_email)
            .await
            .map_err(|err| {
                error!(request_id = %id, email = %request.teacher_email, error = %err, "failed to remove teacher record");
                GatewayError::Store(err)
            })?;

        let rejected = match self.record(&decision).await {
            Ok(rejected) => rejected,
            Err(err @ GatewayError::AlreadyDecided { status: ApprovalStatus::Approved, .. }) => {
                self.restore_approved_teacher(&request, removed).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        // Phase 2: best effort.
        let mut warnings = Vec::new();

        if let Err(err) = self.accounts.delete_account(&rejected.teacher_email).await {
            warn!(request_id = %id, email = %rejected.teacher_email, error = %err, "account deletion failed");
            warnings.push(CleanupWarning {
                step: CleanupStep::AccountDeletion,
                message: format!("failed to delete account for {}: {err}", rejected.teacher_email),
            });
        }

        let reason = rejected.rejection_reason.as_deref().unwrap_or(reason.trim());
        let notification = Notification::new(
            rejected.teacher_id.clone(),
            NotificationKind::TeacherRejected,
            format!("Your teacher registration was rejected: {reason}"),
        );
        if let Err(err) = self.notifications.enqueue(notification).await {
            warn!(request_id = %id, teacher_id = %rejected.teacher_id, error = %err, "rejection notification failed");
            warnings.push(CleanupWarning {
                step: CleanupStep::Notification,
                message: format!("failed to notify {}: {err}", rejected.teacher_id),
            });
        }

        info!(
            request_id = %id,
            decider = %decider,
            email = %rejected.teacher_email,
            warnings = warnings.len(),
            "teacher rejected"
        );
        Ok(DecisionOutcome {
            request: rejected,
            warnings,
        })
    }

    /// Re-run the activation step for an approved request. Idempotent.
    pub async fn retry_activation(&self, id: RequestId) -> Result<ApprovalRequest, GatewayError> {
        let request = self.load(id).await?;
        if request.status != ApprovalStatus::Approved {
            return Err(GatewayError::validation(format!(
                "request {id} is {}; only approved requests can be activated",
                request.status
            )));
        }

        let (Some(decided_by), Some(decided_at)) = (request.decided_by.clone(), request.decided_at) else {
            return Err(GatewayError::Store(StoreError::Storage(format!(
                "approved request {id} has no decider recorded"
            ))));
        };
        let decision = ApprovalDecision {
            request_id: id,
            status: ApprovalStatus::Approved,
            decided_by,
            decided_at,
            rejection_reason: None,
        };

        self.activate_teacher(&request, &decision)
            .await
            .map_err(|source| GatewayError::PartialFailure {
                request_id: id,
                status: request.status,
                stage: "teacher_activation",
                source,
            })?;

        info!(request_id = %id, email = %request.teacher_email, "teacher activation retried");
        Ok(request)
    }

    /// Requests for the administrative queue, newest first.
    pub async fn list_requests(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>, GatewayError> {
        Ok(self.approvals.list(status).await?)
    }

    /// Submit a teacher registration: a pending request plus a pending Teacher record.
    pub async fn submit_registration(
        &self,
        identity: &Identity,
        profile: TeacherProfile,
    ) -> Result<ApprovalRequest, GatewayError> {
        profile.validate()?;
        let email = &identity.email;

        for (_, role) in PROBE_ORDER {
            if self.roles.find_role_record(role, email).await?.is_some() {
                return Err(GatewayError::validation(format!(
                    "{email} is already registered as {role}"
                )));
            }
        }
        if let Some(open) = self.approvals.find_by_email(email).await? {
            if open.is_pending() {
                return Err(GatewayError::validation(format!(
                    "{email} already has pending approval request {}",
                    open.id
                )));
            }
        }

        let request = self
            .approvals
            .create(NewApprovalRequest {
                teacher_id: identity.id.clone(),
                teacher_email: email.clone(),
                fullname: Some(profile.fullname.trim().to_string()),
                avatar_url: profile.avatar_url.clone(),
                requested_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                // Another submission for this email got in after the check above.
                StoreError::Conflict(message) => GatewayError::Validation(message),
                other => GatewayError::Store(other),
            })?;

        let record = RoleRecord::pending_teacher(identity, &profile);
        if let Err(source) = self.roles.upsert_role_record(Role::Teacher, record).await {
            error!(request_id = %request.id, email = %email, error = %source, "pending teacher record write failed");
            return Err(GatewayError::PartialFailure {
                request_id: request.id,
                status: request.status,
                stage: "pending_teacher_record",
                source,
            });
        }

        info!(request_id = %request.id, email = %email, "teacher registration submitted");
        Ok(request)
    }

    /// An approver won the request after this rejecter removed the Teacher
    /// record: put the active record back.
    async fn restore_approved_teacher(&self, request: &ApprovalRequest, removed: Option<RoleRecord>) {
        let id = request.id;
        let restored = match self.retry_activation(id).await {
            Ok(_) => Ok(()),
            // The reload can still see the request as pending; fall back to the
            // record as it was before the delete.
            Err(err) => match removed.filter(RoleRecord::is_active_teacher) {
                Some(record) => self
                    .roles
                    .upsert_role_record(Role::Teacher, record)
                    .await
                    .map_err(GatewayError::Store),
                None => Err(err),
            },
        };

        match restored {
            Ok(()) => warn!(request_id = %id, email = %request.teacher_email, "reject lost to a concurrent approval; teacher record restored"),
            Err(err) => error!(request_id = %id, email = %request.teacher_email, error = %err, "reject lost to a concurrent approval and the teacher record could not be restored; run activation retry"),
        }
    }

    async fn load(&self, id: RequestId) -> Result<ApprovalRequest, GatewayError> {
        self.approvals
            .get(id)
            .await?
            .ok_or(GatewayError::ApprovalNotFound(id))
    }

    async fn record(&self, decision: &ApprovalDecision) -> Result<ApprovalRequest, GatewayError> {
        let id = decision.request_id;
        self.approvals
            .record_decision(decision)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => GatewayError::ApprovalNotFound(id),
                StoreError::NotPending(status) => GatewayError::AlreadyDecided { id, status },
                other => GatewayError::Store(other),
            })
    }

    /// Upsert the Teacher record as active. Safe to repeat.
    async fn activate_teacher(
        &self,
        request: &ApprovalRequest,
        decision: &ApprovalDecision,
    ) -> Result<(), StoreError> {
        let existing = self
            .roles
            .find_role_record(Role::Teacher, &request.teacher_email)
            .await?;

        let record = match existing {
            Some(mut record) => {
                record.activate(decision.decided_by.clone(), decision.decided_at);
                if record.user_id.is_none() {
                    record.user_id = Some(request.teacher_id.clone());
                }
                record
            }
            None => RoleRecord::active_teacher_from_request(
                request,
                decision.decided_by.clone(),
                decision.decided_at,
            ),
        };

        self.roles.upsert_role_record(Role::Teacher, record).await
    }
}
