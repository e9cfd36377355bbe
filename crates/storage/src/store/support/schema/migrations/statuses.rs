#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::util::add_column_if_missing;
use rusqlite::Connection;

// v0 databases only had the core status/progress/io columns.
pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    add_column_if_missing(conn, "job_statuses", "unique_id", "TEXT")?;
    add_column_if_missing(conn, "job_statuses", "batch_id", "TEXT")?;
    add_column_if_missing(conn, "job_statuses", "current_step", "INTEGER")?;
    add_column_if_missing(conn, "job_statuses", "total_jobs", "INTEGER")?;
    add_column_if_missing(conn, "job_statuses", "chain_id", "TEXT")?;
    add_column_if_missing(
        conn,
        "job_statuses",
        "attempts",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    Ok(())
}
