//! Store handle, connection pool, and schema migration.

use std::path::Path;

use sqlx::{Pool, Sqlite};
use tracing::info;

use evstream_core::db::{DatabaseError, open_pool, open_pool_in_memory};

/// Handle to the event store. Cheap to clone; all clones share one pool,
/// so event producers can push while the relay reads.
#[derive(Clone)]
pub struct EventStreamStore {
    pool: Pool<Sqlite>,
}

impl EventStreamStore {
    /// Open or create the store at the given path.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let store = Self {
            pool: open_pool(path).await?,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let store = Self {
            pool: open_pool_in_memory().await?,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the events table if it does not exist.
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Event store migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub(crate) const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
