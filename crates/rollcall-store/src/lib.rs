//! rollcall-store — SQLite persistence behind an async connection.
//!
//! Owns the attendance ledger's atomic write semantics and the read-mostly
//! repositories for collaborator-owned data (courses, enrollments, schedule
//! entries, stored embeddings).

mod courses;
mod embeddings;
mod enrollments;
mod error;
mod ledger;
mod performance;
mod schedules;
mod schema;

pub use enrollments::SelectionOutcome;
pub use error::StoreError;
pub use ledger::MarkOutcome;

use std::path::Path;
use tokio_rusqlite::Connection;
use uuid::Uuid;

/// Handle to the attendance database. Cheap to clone; all access funnels
/// through one background connection.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch(schema::PRAGMAS)?;
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Decode a TEXT uuid column, surfacing parse failures as conversion errors.
pub(crate) fn uuid_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
