//! Teacher approval requests and their one-way state machine.
//!
//! Mirrors the handle/apply split used for aggregates: `handle` decides (pure,
//! no mutation) and `apply` evolves the in-memory state from a decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use schoolgate_core::{DomainError, RequestId, UserId};

use crate::Email;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of an approval request: `Pending → {Approved, Rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl core::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(DomainError::unknown("approval status", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// A teacher's request to be elevated from registered to active.
///
/// `fullname` / `avatar_url` are denormalized copies of the registration so
/// approval can create the Teacher record even if the pending row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub teacher_id: UserId,
    pub teacher_email: Email,
    pub fullname: Option<String>,
    pub avatar_url: Option<String>,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Request data before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalRequest {
    pub teacher_id: UserId,
    pub teacher_email: Email,
    pub fullname: Option<String>,
    pub avatar_url: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl NewApprovalRequest {
    pub fn into_request(self, id: RequestId) -> ApprovalRequest {
        ApprovalRequest {
            id,
            teacher_id: self.teacher_id,
            teacher_email: self.teacher_email,
            fullname: self.fullname,
            avatar_url: self.avatar_url,
            status: ApprovalStatus::Pending,
            requested_at: self.requested_at,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands & decisions
// ─────────────────────────────────────────────────────────────────────────────

/// A decider's instruction for a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalCommand {
    Approve {
        decider: UserId,
        occurred_at: DateTime<Utc>,
    },
    Reject {
        decider: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

/// The fields a decision writes onto a request.
///
/// This is also what the store persists with its conditional
/// "only if still pending" update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub request_id: RequestId,
    pub status: ApprovalStatus,
    pub decided_by: UserId,
    pub decided_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApprovalTransitionError {
    #[error("a rejection reason is required")]
    MissingReason,

    #[error("approval request {id} was already {status}")]
    AlreadyDecided { id: RequestId, status: ApprovalStatus },
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Decide the outcome of a command against the current state (no mutation).
    pub fn handle(&self, command: &ApprovalCommand) -> Result<ApprovalDecision, ApprovalTransitionError> {
        if let ApprovalCommand::Reject { reason, .. } = command {
            if reason.trim().is_empty() {
                return Err(ApprovalTransitionError::MissingReason);
            }
        }

        if !self.is_pending() {
            return Err(ApprovalTransitionError::AlreadyDecided {
                id: self.id,
                status: self.status,
            });
        }

        Ok(match command {
            ApprovalCommand::Approve { decider, occurred_at } => ApprovalDecision {
                request_id: self.id,
                status: ApprovalStatus::Approved,
                decided_by: decider.clone(),
                decided_at: *occurred_at,
                rejection_reason: None,
            },
            ApprovalCommand::Reject {
                decider,
                reason,
                occurred_at,
            } => ApprovalDecision {
                request_id: self.id,
                status: ApprovalStatus::Rejected,
                decided_by: decider.clone(),
                decided_at: *occurred_at,
                rejection_reason: Some(reason.trim().to_string()),
            },
        })
    }

    /// Evolve state from a decision produced by `handle`.
    pub fn apply(&mut self, decision: &ApprovalDecision) {
        self.status = decision.status;
        self.decided_by = Some(decision.decided_by.clone());
        self.decided_at = Some(decision.decided_at);
        self.rejection_reason = decision.rejection_reason.clone();
    }
}
