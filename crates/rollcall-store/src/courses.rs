use crate::{uuid_col, Store, StoreError};
use rollcall_core::types::Course;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

impl Store {
    pub async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO courses (id, name, code, academician_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        course.id.to_string(),
                        course.name,
                        course.code,
                        course.academician_id.map(|id| id.to_string()),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let key = id.to_string();
        let course = self
            .conn()
            .call(move |conn| {
                let course = conn
                    .query_row(
                        "SELECT id, name, code, academician_id FROM courses WHERE id = ?1",
                        params![key],
                        course_from_row,
                    )
                    .optional()?;
                Ok(course)
            })
            .await?;
        Ok(course)
    }
}

fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    let academician: Option<String> = row.get(3)?;
    let academician_id = match academician {
        Some(text) => Some(Uuid::parse_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(Course {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        academician_id,
    })
}
