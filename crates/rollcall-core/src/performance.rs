//! Attendance-rate computation over ledger rows.

use crate::types::{AttendanceRecord, AttendanceStatus};

/// `present / non-cancelled` over a (student, course) pair's ledger rows.
///
/// Cancelled rows are excluded from both numerator and denominator; an
/// empty (or all-cancelled) set yields 0.0.
pub fn attendance_rate(records: &[AttendanceRecord]) -> f64 {
    let counted = records
        .iter()
        .filter(|r| r.status != AttendanceStatus::Cancelled)
        .count();
    if counted == 0 {
        return 0.0;
    }
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    present as f64 / counted as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn row(day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: Uuid::nil(),
            course_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            status,
        }
    }

    #[test]
    fn test_cancelled_excluded_from_denominator() {
        let rows = [
            row(1, AttendanceStatus::Present),
            row(2, AttendanceStatus::Absent),
            row(3, AttendanceStatus::Cancelled),
        ];
        assert!((attendance_rate(&rows) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_set_is_zero() {
        assert_eq!(attendance_rate(&[]), 0.0);
    }

    #[test]
    fn test_all_cancelled_is_zero() {
        let rows = [row(1, AttendanceStatus::Cancelled), row(2, AttendanceStatus::Cancelled)];
        assert_eq!(attendance_rate(&rows), 0.0);
    }

    #[test]
    fn test_all_present_is_one() {
        let rows = [row(1, AttendanceStatus::Present), row(2, AttendanceStatus::Present)];
        assert!((attendance_rate(&rows) - 1.0).abs() < f64::EPSILON);
    }
}
