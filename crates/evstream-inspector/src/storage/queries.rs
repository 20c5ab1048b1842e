//! Event record queries.

use serde_json::Value;

use evstream_core::db::{DatabaseError, unix_timestamp};

use super::db::EventStreamStore;

impl EventStreamStore {
    /// Append one event record. Returns the assigned row id.
    ///
    /// This is the entry point event producers use; the relay itself only
    /// ever reads or clears.
    pub async fn push(&self, record: &Value) -> Result<i64, DatabaseError> {
        let payload =
            serde_json::to_string(record).map_err(|e| DatabaseError::Query(e.to_string()))?;

        let result = sqlx::query("INSERT INTO events (payload, created_at) VALUES (?, ?)")
            .bind(payload)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch every stored record in insertion order.
    pub async fn get(&self) -> Result<Vec<Value>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT payload FROM events ORDER BY id ASC")
            .fetch_all(self.pool())
            .await?;

        rows.into_iter()
            .map(|(payload,)| {
                serde_json::from_str(&payload)
                    .map_err(|e| DatabaseError::Query(format!("Corrupt event payload: {e}")))
            })
            .collect()
    }

    /// Delete every stored record. Returns the number of records removed.
    pub async fn reset(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM events")
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Count stored records.
    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }
}
