#![forbid(unsafe_code)]

mod error;
mod history;
mod locks;
mod statuses;
mod support;
mod types;

pub use error::StoreError;
pub use types::*;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

const DB_FILE_NAME: &str = "job_status.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn, Some(storage_dir))
    }

    /// Private database, gone when the store is dropped. Useful for tests and
    /// single-process deployments that only need live status.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, storage_dir: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        support::migrate_sqlite_schema(&conn)?;
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<String>, StoreError> {
        support::schema_version(&self.conn)
    }
}

/// Wall clock in Unix milliseconds, clamped to the non-negative range. Every
/// timestamp the store and the tracker write comes from here.
pub fn now_ms() -> i64 {
    let ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(ms.max(0)).unwrap_or(i64::MAX)
}
