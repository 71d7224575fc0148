//! SQLite-backed [`RecordStore`].

use crate::error::StoreError;
use crate::pool::DbPool;
use crate::{Collection, RecordStore};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

/// Stores records as JSON text in the `records` table.
///
/// The pool must have had [`crate::run_migrations`] applied.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.pool.get()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT body_json FROM records WHERE collection = ?1 ORDER BY seq ASC")?;
        let rows = stmt.query_map(params![collection.as_str()], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        let body = serde_json::to_string(&record)?;
        let conn = self.pool.get()?;

        // The sequence number is computed inside the INSERT so concurrent
        // writers cannot observe the same MAX(seq); upserts keep the
        // original seq.
        conn.execute(
            "INSERT INTO records (collection, id, seq, body_json)
             VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM records WHERE collection = ?1),
                ?3
             )
             ON CONFLICT (collection, id) DO UPDATE SET
                body_json = excluded.body_json,
                updated_at = datetime('now')",
            params![collection.as_str(), id, body],
        )?;

        tracing::debug!(collection = collection.as_str(), id, "record stored");
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        Ok(removed > 0)
    }
}
