//! Opening the SQLite store.
//!
//! The database runs in WAL mode so concurrent lookups can read while a
//! refresh writes.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA busy_timeout=5000;";

/// SQLite-backed cache store.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Entries carry an explicit `written_at`
/// timestamp instead of relying on file metadata.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Private in-memory database, gone when the store is dropped.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
