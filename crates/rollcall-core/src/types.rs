use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Approval state of a student's course enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    Pending,
    Approved,
    Rejected,
}

#[derive(Error, Debug)]
#[error("unknown approval state: {0}")]
pub struct ParseApprovalError(String);

impl Approval {
    pub fn as_str(self) -> &'static str {
        match self {
            Approval::Pending => "pending",
            Approval::Approved => "approved",
            Approval::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for Approval {
    type Err = ParseApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Approval::Pending),
            "approved" => Ok(Approval::Approved),
            "rejected" => Ok(Approval::Rejected),
            other => Err(ParseApprovalError(other.to_string())),
        }
    }
}

/// A student's enrollment in a course. Owned by the course-selection
/// subsystem; the engine reads it for approval gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub approval: Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub academician_id: Option<Uuid>,
}

/// Tri-state attendance status. Persisted as a nullable boolean:
/// `1` present, `0` absent, `NULL` cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Absent,
    Present,
    Cancelled,
}

impl AttendanceStatus {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => AttendanceStatus::Present,
            Some(false) => AttendanceStatus::Absent,
            None => AttendanceStatus::Cancelled,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            AttendanceStatus::Present => Some(true),
            AttendanceStatus::Absent => Some(false),
            AttendanceStatus::Cancelled => None,
        }
    }
}

/// One ledger row. At most one exists per (student, course, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Recomputed attendance rate for a (student, course) pair, in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub attendance_rate: f64,
}
