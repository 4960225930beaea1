//! Course-schedule resolution: is a session active at an instant, and do
//! two schedules overlap?
//!
//! All time comparisons are inclusive on both bounds. Two entries that
//! merely touch at a shared endpoint (10:00–11:00 vs 11:00–12:00) DO
//! count as overlapping.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("end time {end} precedes start time {start}")]
    InvertedWindow { start: NaiveTime, end: NaiveTime },
    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),
}

/// Day of week, persisted as one of the seven fixed `Monday`..`Sunday`
/// enumerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Weekday {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Monday" => Ok(Weekday::Monday),
            "Tuesday" => Ok(Weekday::Tuesday),
            "Wednesday" => Ok(Weekday::Wednesday),
            "Thursday" => Ok(Weekday::Thursday),
            "Friday" => Ok(Weekday::Friday),
            "Saturday" => Ok(Weekday::Saturday),
            "Sunday" => Ok(Weekday::Sunday),
            other => Err(ScheduleError::UnknownWeekday(other.to_string())),
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// One scheduled weekly occurrence of a course. A course may have several.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub course_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
}

impl ScheduleEntry {
    /// Build an entry, rejecting inverted time windows.
    pub fn new(
        course_id: Uuid,
        weekday: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
        location: Option<String>,
    ) -> Result<Self, ScheduleError> {
        if end_time < start_time {
            return Err(ScheduleError::InvertedWindow {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            course_id,
            weekday,
            start_time,
            end_time,
            location,
        })
    }

    /// Whether `time` falls inside this entry's window, bounds inclusive.
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    /// Interval overlap on the same weekday, bounds inclusive.
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.weekday == other.weekday
            && self.start_time <= other.end_time
            && self.end_time >= other.start_time
    }
}

/// Session activity for a course at a given instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Active(ScheduleEntry),
    NotStarted(ScheduleEntry),
    Ended(ScheduleEntry),
    NoScheduleToday,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

/// Resolve session activity for a course's entries at `now`.
///
/// When no entry is active, the next upcoming entry of the day is
/// returned with `NotStarted`, or the day's last entry with `Ended`, so
/// callers can message start/end times. The day's entries are ordered by
/// start time here; input order carries no meaning.
pub fn resolve_session(entries: &[ScheduleEntry], now: NaiveDateTime) -> SessionState {
    let weekday = Weekday::from(now.date().weekday());
    let time = now.time();
    let mut today: Vec<&ScheduleEntry> = entries.iter().filter(|e| e.weekday == weekday).collect();
    today.sort_by_key(|e| e.start_time);

    if let Some(entry) = today.iter().find(|e| e.covers(time)) {
        return SessionState::Active((*entry).clone());
    }
    if let Some(upcoming) = today.iter().find(|e| time < e.start_time) {
        return SessionState::NotStarted((*upcoming).clone());
    }
    match today.last() {
        Some(entry) => SessionState::Ended((*entry).clone()),
        None => SessionState::NoScheduleToday,
    }
}

/// A detected overlap between a proposed schedule and an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConflict {
    /// The already-enrolled course that clashes.
    pub course_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleConflict {
    pub fn message(&self, course_name: &str) -> String {
        format!(
            "conflicts with {} on {} between {}-{}",
            course_name,
            self.weekday,
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

/// Check every (existing, new) pair sharing a weekday; first conflict wins.
///
/// Must run before an enrollment or schedule mutation commits, atomically
/// with that commit.
pub fn find_conflict(
    new_entries: &[ScheduleEntry],
    existing: &[ScheduleEntry],
) -> Option<ScheduleConflict> {
    for current in existing {
        for candidate in new_entries {
            if candidate.overlaps(current) {
                return Some(ScheduleConflict {
                    course_id: current.course_id,
                    weekday: current.weekday,
                    start_time: current.start_time,
                    end_time: current.end_time,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(course: Uuid, weekday: Weekday, start: NaiveTime, end: NaiveTime) -> ScheduleEntry {
        ScheduleEntry::new(course, weekday, start, end, None).unwrap()
    }

    fn course(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    // 2025-01-06 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_time(t(h, m))
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert!(ScheduleEntry::new(course(1), Weekday::Monday, t(11, 0), t(10, 0), None).is_err());
    }

    #[test]
    fn test_active_inclusive_bounds() {
        let entries = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        assert!(resolve_session(&entries, monday_at(10, 0)).is_active());
        assert!(resolve_session(&entries, monday_at(11, 0)).is_active());
        assert!(resolve_session(&entries, monday_at(10, 30)).is_active());
    }

    #[test]
    fn test_not_started_and_ended() {
        let entries = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        assert!(matches!(
            resolve_session(&entries, monday_at(9, 59)),
            SessionState::NotStarted(_)
        ));
        assert!(matches!(
            resolve_session(&entries, monday_at(11, 1)),
            SessionState::Ended(_)
        ));
    }

    #[test]
    fn test_no_schedule_today() {
        let entries = [entry(course(1), Weekday::Tuesday, t(10, 0), t(11, 0))];
        assert!(matches!(
            resolve_session(&entries, monday_at(10, 30)),
            SessionState::NoScheduleToday
        ));
    }

    #[test]
    fn test_inactive_entry_choice_ignores_input_order() {
        // Later entry listed first; the resolved entry must not depend on it.
        let entries = [
            entry(course(1), Weekday::Monday, t(13, 0), t(14, 0)),
            entry(course(1), Weekday::Monday, t(9, 0), t(10, 0)),
        ];

        // Before both: the 9:00 entry is the one not yet started.
        match resolve_session(&entries, monday_at(8, 0)) {
            SessionState::NotStarted(e) => assert_eq!(e.start_time, t(9, 0)),
            other => panic!("expected NotStarted, got {other:?}"),
        }
        // Between the two: the next upcoming entry, not the ended one.
        match resolve_session(&entries, monday_at(11, 0)) {
            SessionState::NotStarted(e) => assert_eq!(e.start_time, t(13, 0)),
            other => panic!("expected NotStarted, got {other:?}"),
        }
        // After both: the day's last entry has ended.
        match resolve_session(&entries, monday_at(15, 0)) {
            SessionState::Ended(e) => assert_eq!(e.start_time, t(13, 0)),
            other => panic!("expected Ended, got {other:?}"),
        }
    }

    #[test]
    fn test_second_entry_of_day_can_be_active() {
        let entries = [
            entry(course(1), Weekday::Monday, t(9, 0), t(10, 0)),
            entry(course(1), Weekday::Monday, t(13, 0), t(14, 0)),
        ];
        assert!(resolve_session(&entries, monday_at(13, 30)).is_active());
    }

    #[test]
    fn test_conflict_plain_overlap() {
        let existing = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        let new = [entry(course(2), Weekday::Monday, t(10, 30), t(11, 30))];
        let conflict = find_conflict(&new, &existing).unwrap();
        assert_eq!(conflict.course_id, course(1));
    }

    #[test]
    fn test_conflict_touching_endpoint_counts() {
        let existing = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        let new = [entry(course(2), Weekday::Monday, t(11, 0), t(12, 0))];
        assert!(find_conflict(&new, &existing).is_some());
    }

    #[test]
    fn test_no_conflict_one_minute_apart() {
        let existing = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        let new = [entry(course(2), Weekday::Monday, t(11, 1), t(12, 0))];
        assert!(find_conflict(&new, &existing).is_none());
    }

    #[test]
    fn test_no_conflict_different_weekday() {
        let existing = [entry(course(1), Weekday::Monday, t(10, 0), t(11, 0))];
        let new = [entry(course(2), Weekday::Tuesday, t(10, 0), t(11, 0))];
        assert!(find_conflict(&new, &existing).is_none());
    }

    #[test]
    fn test_weekday_string_round_trip() {
        for day in [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
            Weekday::Saturday,
            Weekday::Sunday,
        ] {
            assert_eq!(day.as_str().parse::<Weekday>().unwrap(), day);
        }
    }

    #[test]
    fn test_conflict_message_names_course_and_interval() {
        let conflict = ScheduleConflict {
            course_id: course(1),
            weekday: Weekday::Monday,
            start_time: t(10, 0),
            end_time: t(11, 0),
        };
        let msg = conflict.message("Algorithms");
        assert!(msg.contains("Algorithms"));
        assert!(msg.contains("Monday"));
        assert!(msg.contains("10:00-11:00"));
    }
}
