//! Postgres-backed stores.
//!
//! ## Tables
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `admins`, `hods`, `teachers`, `students` | `email` | one table per role; `teachers` adds `status`, `approved_by`, `approved_at` |
//! | `teacher_approval_requests` | `id` (bigserial) | decisions use a conditional update; at most one `pending` row per email |
//! | `notifications` | `id` (uuid v7) | append only |
//! | accounts table (configurable) | `email` | owned by the auth provider; we only delete |
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolTimedOut`, `PoolClosed`, `Io` | `Unavailable` |
//! | unique violation | `Conflict` |
//! | anything else | `Storage` |
//!
//! Rows that fail to decode (bad email, unknown status) are `Storage` errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use schoolgate_auth::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, Email, NewApprovalRequest, Role, RoleRecord,
    TeacherStanding, TeacherStatus,
};
use schoolgate_core::{RequestId, UserId};

use super::{AccountStore, ApprovalStore, Notification, NotificationSink, RoleStore, StoreError};
use crate::gateway::GatewayStores;

/// DDL for every table except the accounts table, which the auth provider owns.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    email       TEXT PRIMARY KEY,
    user_id     TEXT,
    fullname    TEXT,
    avatar_url  TEXT,
    attributes  JSONB NOT NULL DEFAULT '{}'::jsonb
);
CREATE TABLE IF NOT EXISTS hods (LIKE admins INCLUDING ALL);
CREATE TABLE IF NOT EXISTS students (LIKE admins INCLUDING ALL);
CREATE TABLE IF NOT EXISTS teachers (
    LIKE admins INCLUDING ALL,
    status      TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active')),
    approved_by TEXT,
    approved_at TIMESTAMPTZ
);
CREATE TABLE IF NOT EXISTS teacher_approval_requests (
    id               BIGSERIAL PRIMARY KEY,
    teacher_id       TEXT NOT NULL,
    teacher_email    TEXT NOT NULL,
    fullname         TEXT,
    avatar_url       TEXT,
    status           TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected')),
    requested_at     TIMESTAMPTZ NOT NULL,
    decided_by       TEXT,
    decided_at       TIMESTAMPTZ,
    rejection_reason TEXT
);
CREATE INDEX IF NOT EXISTS teacher_approval_requests_email_idx
    ON teacher_approval_requests (teacher_email, requested_at DESC);
CREATE UNIQUE INDEX IF NOT EXISTS teacher_approval_requests_one_pending_idx
    ON teacher_approval_requests (teacher_email) WHERE status = 'pending';
CREATE TABLE IF NOT EXISTS notifications (
    id         UUID PRIMARY KEY,
    user_id    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    message    TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

/// Connect a small pool. Fails fast if the database is unreachable.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the gateway's tables if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// All four stores over one pool.
pub fn stores(pool: PgPool, accounts_table: &str) -> Result<GatewayStores, StoreError> {
    let pool = Arc::new(pool);
    Ok(GatewayStores {
        roles: Arc::new(PostgresRoleStore { pool: pool.clone() }),
        approvals: Arc::new(PostgresApprovalStore { pool: pool.clone() }),
        accounts: Arc::new(PostgresAccountStore::new(pool.clone(), accounts_table)?),
        notifications: Arc::new(PostgresNotificationSink { pool }),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Role tables
// ─────────────────────────────────────────────────────────────────────────────

fn role_table(role: Role) -> &'static str {
    match role {
        Role::Admin => "admins",
        Role::Hod => "hods",
        Role::Teacher => "teachers",
        Role::Student => "students",
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRoleStore {
    pool: Arc<PgPool>,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait::async_trait]
impl RoleStore for PostgresRoleStore {
    #[instrument(skip(self), fields(role = %role, email = %email.as_str()), err)]
    async fn find_role_record(&self, role: Role, email: &Email) -> Result<Option<RoleRecord>, StoreError> {
        let sql = if role == Role::Teacher {
            "SELECT email, user_id, fullname, avatar_url, attributes, status, approved_by, approved_at \
             FROM teachers WHERE email = $1"
                .to_string()
        } else {
            format!(
                "SELECT email, user_id, fullname, avatar_url, attributes FROM {} WHERE email = $1",
                role_table(role)
            )
        };

        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_record", e))?;

        row.map(|row| role_record_from_row(role, &row)).transpose()
    }

    #[instrument(skip(self, record), fields(role = %role, email = %record.email.as_str()), err)]
    async fn upsert_role_record(&self, role: Role, record: RoleRecord) -> Result<(), StoreError> {
        let attributes = JsonValue::Object(record.attributes.clone());
        let user_id = record.user_id.as_ref().map(|id| id.as_str().to_string());

        let query = if role == Role::Teacher {
            let standing = record.teacher.clone().unwrap_or_default();
            sqlx::query(
                r#"
                INSERT INTO teachers (email, user_id, fullname, avatar_url, attributes, status, approved_by, approved_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (email) DO UPDATE SET
                    user_id = EXCLUDED.user_id,
                    fullname = EXCLUDED.fullname,
                    avatar_url = EXCLUDED.avatar_url,
                    attributes = EXCLUDED.attributes,
                    status = EXCLUDED.status,
                    approved_by = EXCLUDED.approved_by,
                    approved_at = EXCLUDED.approved_at
                "#,
            )
            .bind(record.email.as_str().to_string())
            .bind(user_id)
            .bind(record.fullname)
            .bind(record.avatar_url)
            .bind(attributes)
            .bind(standing.status.as_str())
            .bind(standing.approved_by.map(|id| id.as_str().to_string()))
            .bind(standing.approved_at)
        } else {
            // Table name comes from `role_table`, never from input.
            let sql = format!(
                "INSERT INTO {} (email, user_id, fullname, avatar_url, attributes) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (email) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, fullname = EXCLUDED.fullname, \
                 avatar_url = EXCLUDED.avatar_url, attributes = EXCLUDED.attributes",
                role_table(role)
            );
            return sqlx::query(&sql)
                .bind(record.email.as_str())
                .bind(user_id)
                .bind(record.fullname)
                .bind(record.avatar_url)
                .bind(attributes)
                .execute(&*self.pool)
                .await
                .map(|_| ())
                .map_err(|e| map_sqlx_error("upsert_role_record", e));
        };

        query
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_role_record", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(role = %role, email = %email.as_str()), err)]
    async fn delete_role_record(&self, role: Role, email: &Email) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE email = $1", role_table(role));
        let result = sqlx::query(&sql)
            .bind(email.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role_record", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn role_record_from_row(role: Role, row: &PgRow) -> Result<RoleRecord, StoreError> {
    let email: String = column(row, "email")?;
    let user_id: Option<String> = column(row, "user_id")?;
    let attributes: Option<JsonValue> = column(row, "attributes")?;

    let attributes = match attributes {
        Some(JsonValue::Object(map)) => map,
        Some(JsonValue::Null) | None => Map::new(),
        Some(other) => {
            return Err(StoreError::Storage(format!(
                "attributes must be a JSON object, found {other}"
            )));
        }
    };

    let teacher = if role == Role::Teacher {
        let status: String = column(row, "status")?;
        let approved_by: Option<String> = column(row, "approved_by")?;
        Some(TeacherStanding {
            status: status.parse::<TeacherStatus>().map_err(corrupt)?,
            approved_by: approved_by.map(UserId::new).transpose().map_err(corrupt)?,
            approved_at: column(row, "approved_at")?,
        })
    } else {
        None
    };

    Ok(RoleRecord {
        email: Email::parse(email).map_err(corrupt)?,
        user_id: user_id.map(UserId::new).transpose().map_err(corrupt)?,
        fullname: column(row, "fullname")?,
        avatar_url: column(row, "avatar_url")?,
        attributes,
        teacher,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Approval requests
// ─────────────────────────────────────────────────────────────────────────────

const REQUEST_COLUMNS: &str = "id, teacher_id, teacher_email, fullname, avatar_url, status, \
                               requested_at, decided_by, decided_at, rejection_reason";

#[derive(Debug, Clone)]
pub struct PostgresApprovalStore {
    pool: Arc<PgPool>,
}

impl PostgresApprovalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait::async_trait]
impl ApprovalStore for PostgresApprovalStore {
    #[instrument(skip(self), fields(email = %email.as_str()), err)]
    async fn find_by_email(&self, email: &Email) -> Result<Option<ApprovalRequest>, StoreError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM teacher_approval_requests \
             WHERE teacher_email = $1 ORDER BY requested_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_email", e))?;
        row.map(|row| request_from_row(&row)).transpose()
    }

    #[instrument(skip(self), fields(request_id = %id), err)]
    async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM teacher_approval_requests WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.value())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_request", e))?;
        row.map(|row| request_from_row(&row)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>, StoreError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM teacher_approval_requests \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY requested_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_requests", e))?;
        rows.iter().map(request_from_row).collect()
    }

    #[instrument(skip(self, request), fields(email = %request.teacher_email.as_str()), err)]
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, StoreError> {
        let sql = format!(
            "INSERT INTO teacher_approval_requests \
             (teacher_id, teacher_email, fullname, avatar_url, status, requested_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5) \
             RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(request.teacher_id.as_str())
            .bind(request.teacher_email.as_str())
            .bind(request.fullname)
            .bind(request.avatar_url)
            .bind(request.requested_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_request", e))?;
        request_from_row(&row)
    }

    #[instrument(
        skip(self, decision),
        fields(request_id = %decision.request_id, status = %decision.status),
        err
    )]
    async fn record_decision(&self, decision: &ApprovalDecision) -> Result<ApprovalRequest, StoreError> {
        // Single statement: the status guard and the write cannot interleave with
        // another decider's update.
        let sql = format!(
            "UPDATE teacher_approval_requests \
             SET status = $2, decided_by = $3, decided_at = $4, rejection_reason = $5 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {REQUEST_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(decision.request_id.value())
            .bind(decision.status.as_str())
            .bind(decision.decided_by.as_str())
            .bind(decision.decided_at)
            .bind(decision.rejection_reason.as_deref())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_decision", e))?;

        if let Some(row) = updated {
            return request_from_row(&row);
        }

        let current = sqlx::query("SELECT status FROM teacher_approval_requests WHERE id = $1")
            .bind(decision.request_id.value())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_decision", e))?;

        match current {
            None => Err(StoreError::NotFound),
            Some(row) => {
                let status: String = column(&row, "status")?;
                Err(StoreError::NotPending(
                    status.parse::<ApprovalStatus>().map_err(corrupt)?,
                ))
            }
        }
    }
}

fn request_from_row(row: &PgRow) -> Result<ApprovalRequest, StoreError> {
    let id: i64 = column(row, "id")?;
    let teacher_id: String = column(row, "teacher_id")?;
    let teacher_email: String = column(row, "teacher_email")?;
    let status: String = column(row, "status")?;
    let requested_at: DateTime<Utc> = column(row, "requested_at")?;
    let decided_by: Option<String> = column(row, "decided_by")?;

    Ok(ApprovalRequest {
        id: RequestId::new(id),
        teacher_id: UserId::new(teacher_id).map_err(corrupt)?,
        teacher_email: Email::parse(teacher_email).map_err(corrupt)?,
        fullname: column(row, "fullname")?,
        avatar_url: column(row, "avatar_url")?,
        status: status.parse::<ApprovalStatus>().map_err(corrupt)?,
        requested_at,
        decided_by: decided_by.map(UserId::new).transpose().map_err(corrupt)?,
        decided_at: column(row, "decided_at")?,
        rejection_reason: column(row, "rejection_reason")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts & notifications
// ─────────────────────────────────────────────────────────────────────────────

/// Deletes rows from the auth provider's account table.
#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
    delete_sql: String,
}

impl PostgresAccountStore {
    /// `table` may be schema-qualified (`auth.users`). It is spliced into SQL, so
    /// only `[A-Za-z_][A-Za-z0-9_]*` segments are accepted.
    pub fn new(pool: Arc<PgPool>, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::Storage(format!("invalid accounts table name: {table:?}")));
        }
        Ok(Self {
            pool,
            delete_sql: format!("DELETE FROM {table} WHERE lower(email) = $1"),
        })
    }
}

#[async_trait::async_trait]
impl AccountStore for PostgresAccountStore {
    #[instrument(skip(self), fields(email = %email.as_str()), err)]
    async fn delete_account(&self, email: &Email) -> Result<bool, StoreError> {
        let result = sqlx::query(&self.delete_sql)
            .bind(email.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresNotificationSink {
    pool: Arc<PgPool>,
}

impl PostgresNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait::async_trait]
impl NotificationSink for PostgresNotificationSink {
    #[instrument(skip(self, notification), fields(user_id = %notification.user_id, kind = notification.kind.as_str()), err)]
    async fn enqueue(&self, notification: Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id.as_str())
        .bind(notification.kind.as_str())
        .bind(notification.message)
        .bind(notification.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enqueue_notification", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Storage(format!("failed to decode column '{name}': {e}")))
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("corrupt row: {err}"))
}

fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(format!("{operation}: {}", db_err.message()))
        }
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        other => StoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
