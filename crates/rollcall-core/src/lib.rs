//! rollcall-core — Attendance eligibility and face-match domain logic.
//!
//! Pure, I/O-free building blocks: embedding-based identity matching,
//! course-schedule session resolution and conflict detection, and
//! attendance-rate computation.

pub mod matcher;
pub mod performance;
pub mod schedule;
pub mod types;

pub use matcher::{DistanceMatcher, Embedding, EnrolledFace, MatchHit, Matcher, DEFAULT_TOLERANCE};
pub use schedule::{
    find_conflict, resolve_session, ScheduleConflict, ScheduleEntry, ScheduleError, SessionState,
    Weekday,
};
pub use types::{Approval, AttendanceRecord, AttendanceStatus, Course, Enrollment, PerformanceRecord};
