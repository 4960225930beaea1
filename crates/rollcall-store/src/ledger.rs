//! The attendance ledger: one row per (student, course, date), tri-state
//! status, atomic transitions.
//!
//! Writers never read-then-write across statements visible to each other:
//! `mark_present` runs inside one IMMEDIATE transaction and `insert_absent`
//! is a single conditional insert, so a concurrent identification and a
//! Materializer baseline insert for the same key cannot produce two rows
//! or lose an update.

use crate::{uuid_col, Store, StoreError};
use chrono::NaiveDate;
use rollcall_core::types::{AttendanceRecord, AttendanceStatus};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

/// What an identification write did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    /// No row existed; a present row was created.
    Created,
    /// A baseline absent row was flipped to present.
    Updated,
    /// The row was already present; nothing written.
    AlreadyPresent,
    /// The row is cancelled; cancellation is terminal for identification.
    SessionCancelled,
}

impl Store {
    /// Record a successful identification for `(student, course, date)`.
    ///
    /// The whole transition runs in one write transaction keyed on the
    /// ledger's primary key, so it is atomic with respect to every other
    /// writer. A cancelled row is never resurrected.
    pub async fn mark_present(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        date: NaiveDate,
    ) -> Result<MarkOutcome, StoreError> {
        let (student, course) = (student_id.to_string(), course_id.to_string());
        let outcome = self
            .conn()
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let existing: Option<Option<bool>> = tx
                    .query_row(
                        "SELECT status FROM attendance
                         WHERE student_id = ?1 AND course_id = ?2 AND date = ?3",
                        params![student, course, date],
                        |row| row.get(0),
                    )
                    .optional()?;

                let outcome = match existing {
                    None => {
                        tx.execute(
                            "INSERT INTO attendance (student_id, course_id, date, status)
                             VALUES (?1, ?2, ?3, 1)",
                            params![student, course, date],
                        )?;
                        MarkOutcome::Created
                    }
                    Some(Some(false)) => {
                        tx.execute(
                            "UPDATE attendance SET status = 1
                             WHERE student_id = ?1 AND course_id = ?2 AND date = ?3
                               AND status = 0",
                            params![student, course, date],
                        )?;
                        MarkOutcome::Updated
                    }
                    Some(Some(true)) => MarkOutcome::AlreadyPresent,
                    Some(None) => MarkOutcome::SessionCancelled,
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await?;

        tracing::debug!(
            student = %student_id,
            course = %course_id,
            %date,
            ?outcome,
            "ledger mark_present"
        );
        Ok(outcome)
    }

    /// Insert a baseline absent row if and only if no row exists for the
    /// key. Never overwrites, including a row a near-simultaneous
    /// identification already flipped to present.
    pub async fn insert_absent(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let (student, course) = (student_id.to_string(), course_id.to_string());
        let inserted = self
            .conn()
            .call(move |conn| {
                let n = conn.execute(
                    "INSERT INTO attendance (student_id, course_id, date, status)
                     VALUES (?1, ?2, ?3, 0)
                     ON CONFLICT (student_id, course_id, date) DO NOTHING",
                    params![student, course, date],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// Cancel a course's session for a date: every listed student gets a
    /// `NULL`-status row, overwriting any prior value. One transaction;
    /// returns the number of rows written.
    pub async fn cancel_day(
        &self,
        course_id: Uuid,
        date: NaiveDate,
        student_ids: Vec<Uuid>,
    ) -> Result<usize, StoreError> {
        let course = course_id.to_string();
        let cancelled = self
            .conn()
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut cancelled = 0;
                for student in &student_ids {
                    cancelled += tx.execute(
                        "INSERT INTO attendance (student_id, course_id, date, status)
                         VALUES (?1, ?2, ?3, NULL)
                         ON CONFLICT (student_id, course_id, date)
                         DO UPDATE SET status = NULL",
                        params![student.to_string(), course, date],
                    )?;
                }
                tx.commit()?;
                Ok(cancelled)
            })
            .await?;

        tracing::info!(course = %course_id, %date, cancelled, "session cancelled");
        Ok(cancelled)
    }

    /// All ledger rows for a (student, course) pair, oldest first.
    pub async fn records_for(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let (student, course) = (student_id.to_string(), course_id.to_string());
        let records = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT student_id, course_id, date, status FROM attendance
                     WHERE student_id = ?1 AND course_id = ?2
                     ORDER BY date",
                )?;
                let rows = stmt
                    .query_map(params![student, course], |row| {
                        Ok(AttendanceRecord {
                            student_id: uuid_col(row, 0)?,
                            course_id: uuid_col(row, 1)?,
                            date: row.get(2)?,
                            status: AttendanceStatus::from_flag(row.get(3)?),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(records)
    }
}
