//! Data-access boundary for the gateway.
//!
//! Every collaborator the core consumes is an async trait here: the session
//! source, the four role tables, the approval table, the external account store
//! and the notification sink. Implementations live alongside (in-memory for
//! tests/dev, Postgres behind the `postgres` feature).

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schoolgate_auth::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, Email, Identity, NewApprovalRequest,
    RoleRecord, Role,
};
use schoolgate_core::{RequestId, UserId};

pub use in_memory::{
    InMemoryAccountStore, InMemoryApprovalStore, InMemoryNotificationSink, InMemoryRoleStore,
    InMemoryStores, StaticSession,
};

/// Store operation error.
///
/// These are **infrastructure errors** (reachability, corrupt rows, lost races)
/// as opposed to domain errors (validation, invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Conditional transition lost: the request is no longer pending.
    #[error("approval request is no longer pending (now {0})")]
    NotPending(ApprovalStatus),

    /// The backend could not be reached (timeouts, closed pools, network).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness rule rejected the write.
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Supplies the authenticated principal for the current request, if any.
#[async_trait::async_trait]
pub trait SessionSource: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>, StoreError>;
}

/// The four disjoint role tables, addressed by the role they grant.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_record(&self, role: Role, email: &Email) -> Result<Option<RoleRecord>, StoreError>;

    /// Insert or replace the record keyed by `record.email`.
    async fn upsert_role_record(&self, role: Role, record: RoleRecord) -> Result<(), StoreError>;

    /// Remove the record for `email`. Returns whether a row existed.
    async fn delete_role_record(&self, role: Role, email: &Email) -> Result<bool, StoreError>;
}

/// Teacher approval requests.
#[async_trait::async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Most recent request for a teacher email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<ApprovalRequest>, StoreError>;

    async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Requests (optionally filtered by status), newest first.
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Insert a pending request. `Conflict` if the email already has one open.
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, StoreError>;

    /// Write a decision only if the request is still pending.
    ///
    /// Implementations must make the status check and the write a single atomic
    /// step: `NotFound` if the id is unknown, `NotPending(current)` if another
    /// decider got there first.
    async fn record_decision(&self, decision: &ApprovalDecision) -> Result<ApprovalRequest, StoreError>;
}

/// External account store (the auth provider's user table).
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Delete the account registered under `email`. Returns whether one existed.
    async fn delete_account(&self, email: &Email) -> Result<bool, StoreError>;
}

/// External notification sink.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TeacherRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TeacherRejected => "teacher_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
