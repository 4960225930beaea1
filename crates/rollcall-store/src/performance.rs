use crate::{uuid_col, Store, StoreError};
use rollcall_core::types::PerformanceRecord;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

impl Store {
    /// Upsert the single performance row for a (student, course) pair.
    /// Recomputed, never appended.
    pub async fn upsert_rate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        rate: f64,
    ) -> Result<(), StoreError> {
        let (student, course) = (student_id.to_string(), course_id.to_string());
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO performance (student_id, course_id, attendance_rate)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (student_id, course_id)
                     DO UPDATE SET attendance_rate = excluded.attendance_rate",
                    params![student, course, rate],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn performance(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<PerformanceRecord>, StoreError> {
        let (student, course) = (student_id.to_string(), course_id.to_string());
        let record = self
            .conn()
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT student_id, course_id, attendance_rate
                         FROM performance WHERE student_id = ?1 AND course_id = ?2",
                        params![student, course],
                        |row| {
                            Ok(PerformanceRecord {
                                student_id: uuid_col(row, 0)?,
                                course_id: uuid_col(row, 1)?,
                                attendance_rate: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }
}
