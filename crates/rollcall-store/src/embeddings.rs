//! Stored face embeddings, serialized at rest as JSON arrays of f32.

use crate::{uuid_col, Store, StoreError};
use rollcall_core::matcher::{Embedding, EnrolledFace};
use rusqlite::params;
use uuid::Uuid;

impl Store {
    pub async fn add_embedding(
        &self,
        student_id: Uuid,
        embedding: &Embedding,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let key = id.to_string();
        let student = student_id.to_string();
        let encoded = serde_json::to_string(&embedding.values)?;
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO face_embeddings (id, student_id, embedding)
                     VALUES (?1, ?2, ?3)",
                    params![key, student, encoded],
                )?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// The full identification gallery: every stored embedding with its
    /// owning student. Scan order is decided by the matcher, not here.
    pub async fn gallery(&self) -> Result<Vec<EnrolledFace>, StoreError> {
        let gallery = self
            .conn()
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT student_id, embedding FROM face_embeddings")?;
                let rows = stmt
                    .query_map([], |row| {
                        let encoded: String = row.get(1)?;
                        let values: Vec<f32> =
                            serde_json::from_str(&encoded).map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    1,
                                    rusqlite::types::Type::Text,
                                    Box::new(e),
                                )
                            })?;
                        Ok(EnrolledFace {
                            student_id: uuid_col(row, 0)?,
                            embedding: Embedding::new(values),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(gallery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gallery_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let student = Uuid::new_v4();
        store
            .add_embedding(student, &Embedding::new(vec![0.25, -1.5, 3.0]))
            .await
            .unwrap();
        store
            .add_embedding(student, &Embedding::new(vec![0.5, 0.5, 0.5]))
            .await
            .unwrap();

        let gallery = store.gallery().await.unwrap();
        assert_eq!(gallery.len(), 2);
        assert!(gallery.iter().all(|f| f.student_id == student));
        assert!(gallery
            .iter()
            .any(|f| f.embedding.values == vec![0.25, -1.5, 3.0]));
    }
}
