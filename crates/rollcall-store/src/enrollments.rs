//! Enrollment repository, including the conflict-gated course selection.
//!
//! The schedule-conflict check runs inside the same transaction that
//! inserts the pending enrollments: either every requested course commits
//! conflict-free or nothing does.

use crate::schedules::entries_for_course_sync;
use crate::{uuid_col, Store, StoreError};
use rollcall_core::schedule::{find_conflict, ScheduleEntry};
use rollcall_core::types::{Approval, Enrollment};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use uuid::Uuid;

/// Result of a course-selection request.
#[derive(Debug)]
pub enum SelectionOutcome {
    Created(Vec<Enrollment>),
    MissingCourse(Uuid),
    AlreadySelected(Uuid),
    Conflict { course_id: Uuid, message: String },
}

impl Store {
    /// Direct enrollment insert, bypassing the conflict gate. Seeding and
    /// collaborator plumbing only.
    pub async fn add_enrollment(&self, enrollment: Enrollment) -> Result<(), StoreError> {
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO enrollments (id, student_id, course_id, approval)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        enrollment.id.to_string(),
                        enrollment.student_id.to_string(),
                        enrollment.course_id.to_string(),
                        enrollment.approval.as_str(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, StoreError> {
        let key = id.to_string();
        let enrollment = self
            .conn()
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, student_id, course_id, approval
                         FROM enrollments WHERE id = ?1",
                        params![key],
                        enrollment_from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(enrollment)
    }

    pub async fn set_approval(&self, id: Uuid, approval: Approval) -> Result<bool, StoreError> {
        let key = id.to_string();
        let updated = self
            .conn()
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE enrollments SET approval = ?1 WHERE id = ?2",
                    params![approval.as_str(), key],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    /// Students with an approved enrollment for `course_id`, ascending.
    pub async fn approved_students(&self, course_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let key = course_id.to_string();
        let students = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT student_id FROM enrollments
                     WHERE course_id = ?1 AND approval = 'approved'
                     ORDER BY student_id",
                )?;
                let rows = stmt
                    .query_map(params![key], |row| uuid_col(row, 0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(students)
    }

    /// Select one or more courses for a student, gated on schedule
    /// conflicts against every non-rejected selection the student already
    /// holds (and against the other courses in the same request).
    /// All-or-nothing: the first problem rolls the whole request back.
    pub async fn select_courses(
        &self,
        student_id: Uuid,
        course_ids: Vec<Uuid>,
    ) -> Result<SelectionOutcome, StoreError> {
        let student = student_id.to_string();
        let outcome = self
            .conn()
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let mut selected: HashSet<Uuid> = {
                    let mut stmt = tx.prepare(
                        "SELECT course_id FROM enrollments
                         WHERE student_id = ?1 AND approval != 'rejected'",
                    )?;
                    let rows = stmt
                        .query_map(params![student], |row| uuid_col(row, 0))?
                        .collect::<Result<HashSet<_>, _>>()?;
                    rows
                };

                let mut existing_entries: Vec<ScheduleEntry> = Vec::new();
                for course in &selected {
                    existing_entries.extend(entries_for_course_sync(&tx, &course.to_string())?);
                }

                let mut created = Vec::new();
                for course_id in course_ids {
                    if selected.contains(&course_id) {
                        return Ok(SelectionOutcome::AlreadySelected(course_id));
                    }
                    let name: Option<String> = tx
                        .query_row(
                            "SELECT name FROM courses WHERE id = ?1",
                            params![course_id.to_string()],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if name.is_none() {
                        return Ok(SelectionOutcome::MissingCourse(course_id));
                    }

                    let new_entries = entries_for_course_sync(&tx, &course_id.to_string())?;
                    if let Some(conflict) = find_conflict(&new_entries, &existing_entries) {
                        let clash_name: String = tx
                            .query_row(
                                "SELECT name FROM courses WHERE id = ?1",
                                params![conflict.course_id.to_string()],
                                |row| row.get(0),
                            )
                            .optional()?
                            .unwrap_or_else(|| conflict.course_id.to_string());
                        return Ok(SelectionOutcome::Conflict {
                            course_id,
                            message: conflict.message(&clash_name),
                        });
                    }

                    let enrollment = Enrollment {
                        id: Uuid::new_v4(),
                        student_id: uuid_col_value(&student)?,
                        course_id,
                        approval: Approval::Pending,
                    };
                    tx.execute(
                        "INSERT INTO enrollments (id, student_id, course_id, approval)
                         VALUES (?1, ?2, ?3, 'pending')",
                        params![
                            enrollment.id.to_string(),
                            student,
                            course_id.to_string()
                        ],
                    )?;
                    selected.insert(course_id);
                    existing_entries.extend(new_entries);
                    created.push(enrollment);
                }

                tx.commit()?;
                Ok(SelectionOutcome::Created(created))
            })
            .await?;
        Ok(outcome)
    }
}

fn uuid_col_value(text: &str) -> Result<Uuid, tokio_rusqlite::Error> {
    Uuid::parse_str(text).map_err(|e| {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
    })
}

fn enrollment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    let approval: String = row.get(3)?;
    let approval = approval.parse::<Approval>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Enrollment {
        id: uuid_col(row, 0)?,
        student_id: uuid_col(row, 1)?,
        course_id: uuid_col(row, 2)?,
        approval,
    })
}
