use core::str::FromStr;

use serde::{Deserialize, Serialize};

use schoolgate_core::DomainError;

/// The four mutually-exclusive identity classes of the portal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Hod,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Hod, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Hod => "hod",
            Role::Admin => "admin",
        }
    }

    /// Roles allowed to sign off on teacher approval requests.
    pub fn can_decide_approvals(&self) -> bool {
        matches!(self, Role::Hod | Role::Admin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "hod" => Ok(Role::Hod),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::unknown("role", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn only_hod_and_admin_decide() {
        assert!(Role::Admin.can_decide_approvals());
        assert!(Role::Hod.can_decide_approvals());
        assert!(!Role::Teacher.can_decide_approvals());
        assert!(!Role::Student.can_decide_approvals());
    }
}
