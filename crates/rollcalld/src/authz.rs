//! Role/action authorization as a typed capability table.
//!
//! Capabilities are (role, action) tuples evaluated exactly; there is no
//! prefix or pattern matching, so granting one action can never leak an
//! unrelated one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Academician,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "academician" => Ok(Role::Academician),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Identify,
    BatchIdentify,
    CancelSession,
    SelectCourses,
    ReviewEnrollment,
}

const CAPABILITIES: &[(Role, Action)] = &[
    (Role::Student, Action::Identify),
    (Role::Student, Action::SelectCourses),
    (Role::Academician, Action::BatchIdentify),
    (Role::Academician, Action::CancelSession),
    (Role::Academician, Action::ReviewEnrollment),
];

pub fn allowed(role: Role, action: Action) -> bool {
    CAPABILITIES.contains(&(role, action))
}

/// Authenticated caller identity, as established at the transport boundary.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}
