use crate::{uuid_col, Store, StoreError};
use rollcall_core::schedule::{ScheduleEntry, Weekday};
use rusqlite::params;
use uuid::Uuid;

impl Store {
    /// Persist a schedule entry (already validated by `ScheduleEntry::new`).
    pub async fn add_schedule_entry(&self, entry: ScheduleEntry) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let key = id.to_string();
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO schedule_entries
                         (id, course_id, weekday, start_time, end_time, location)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        key,
                        entry.course_id.to_string(),
                        entry.weekday.as_str(),
                        entry.start_time,
                        entry.end_time,
                        entry.location,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    pub async fn schedule_for_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        let key = course_id.to_string();
        let entries = self
            .conn()
            .call(move |conn| entries_for_course_sync(conn, &key))
            .await?;
        Ok(entries)
    }

    /// Every entry scheduled on `weekday`, across all courses. Feeds the
    /// Materializer's tick window filter.
    pub async fn entries_for_weekday(
        &self,
        weekday: Weekday,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        let entries = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT course_id, weekday, start_time, end_time, location
                     FROM schedule_entries WHERE weekday = ?1",
                )?;
                let rows = stmt
                    .query_map(params![weekday.as_str()], entry_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }
}

pub(crate) fn entries_for_course_sync(
    conn: &rusqlite::Connection,
    course_id: &str,
) -> Result<Vec<ScheduleEntry>, tokio_rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT course_id, weekday, start_time, end_time, location
         FROM schedule_entries WHERE course_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![course_id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    let weekday: String = row.get(1)?;
    let weekday = weekday.parse::<Weekday>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ScheduleEntry {
        course_id: uuid_col(row, 0)?,
        weekday,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        location: row.get(4)?,
    })
}
