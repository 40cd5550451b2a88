//! Role records: one row in one of the four role tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use schoolgate_core::{DomainError, DomainResult, UserId};

use crate::{ApprovalRequest, Email, Identity};

// ─────────────────────────────────────────────────────────────────────────────
// Teacher standing
// ─────────────────────────────────────────────────────────────────────────────

/// Approval status of a Teacher record (only the Teacher table carries one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeacherStatus {
    /// Registered, waiting for HOD/Admin sign-off.
    #[default]
    Pending,
    /// Signed off; the record grants the Teacher role.
    Active,
}

impl TeacherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeacherStatus::Pending => "pending",
            TeacherStatus::Active => "active",
        }
    }
}

impl core::fmt::Display for TeacherStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TeacherStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TeacherStatus::Pending),
            "active" => Ok(TeacherStatus::Active),
            other => Err(DomainError::unknown("teacher status", other)),
        }
    }
}

/// Teacher-only columns: status plus sign-off metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TeacherStanding {
    pub status: TeacherStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Role record
// ─────────────────────────────────────────────────────────────────────────────

/// A row identifying a user as Student/Teacher/HOD/Admin.
///
/// Which role it grants is decided by the table it lives in, not by the row.
/// Role-specific attributes (department, qualifications, grade, ...) are opaque
/// to the gateway and kept as a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub email: Email,
    pub user_id: Option<UserId>,
    pub fullname: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<TeacherStanding>,
}

impl RoleRecord {
    pub fn new(email: Email) -> Self {
        Self {
            email,
            user_id: None,
            fullname: None,
            avatar_url: None,
            attributes: Map::new(),
            teacher: None,
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_fullname(mut self, fullname: impl Into<String>) -> Self {
        self.fullname = Some(fullname.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_teacher_status(mut self, status: TeacherStatus) -> Self {
        self.teacher.get_or_insert_with(TeacherStanding::default).status = status;
        self
    }

    /// Pending Teacher record created when a teacher submits their registration.
    pub fn pending_teacher(identity: &Identity, profile: &TeacherProfile) -> Self {
        let mut attributes = Map::new();
        if let Some(department) = &profile.department {
            attributes.insert("department".to_string(), JsonValue::String(department.clone()));
        }
        if let Some(qualifications) = &profile.qualifications {
            attributes.insert(
                "qualifications".to_string(),
                JsonValue::String(qualifications.clone()),
            );
        }

        Self {
            email: identity.email.clone(),
            user_id: Some(identity.id.clone()),
            fullname: Some(profile.fullname.clone()),
            avatar_url: profile.avatar_url.clone(),
            attributes,
            teacher: Some(TeacherStanding::default()),
        }
    }

    /// Active Teacher record built from an approved request's denormalized fields.
    ///
    /// Used when approval finds no Teacher row to update.
    pub fn active_teacher_from_request(
        request: &ApprovalRequest,
        approved_by: UserId,
        approved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: request.teacher_email.clone(),
            user_id: Some(request.teacher_id.clone()),
            fullname: request.fullname.clone(),
            avatar_url: request.avatar_url.clone(),
            attributes: Map::new(),
            teacher: Some(TeacherStanding {
                status: TeacherStatus::Active,
                approved_by: Some(approved_by),
                approved_at: Some(approved_at),
            }),
        }
    }

    /// Mark an existing Teacher record as signed off.
    pub fn activate(&mut self, approved_by: UserId, approved_at: DateTime<Utc>) {
        self.teacher = Some(TeacherStanding {
            status: TeacherStatus::Active,
            approved_by: Some(approved_by),
            approved_at: Some(approved_at),
        });
    }

    pub fn teacher_status(&self) -> Option<TeacherStatus> {
        self.teacher.as_ref().map(|t| t.status)
    }

    /// Whether a row found in the Teacher table grants the Teacher role.
    ///
    /// Rows without standing are treated as pending: the column is mandatory
    /// on the Teacher table and a missing value must not grant access.
    pub fn is_active_teacher(&self) -> bool {
        self.teacher_status() == Some(TeacherStatus::Active)
    }
}

/// Registration details a teacher submits while onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub fullname: String,
    pub avatar_url: Option<String>,
    pub department: Option<String>,
    pub qualifications: Option<String>,
}

impl TeacherProfile {
    pub fn validate(&self) -> DomainResult<()> {
        if self.fullname.trim().is_empty() {
            return Err(DomainError::validation("fullname cannot be empty"));
        }
        Ok(())
    }
}
