#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use rusqlite::{Connection, params};

pub(super) fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), StoreError> {
    if has_column(conn, table, column)? {
        return Ok(());
    }
    tracing::info!(table, column, "adding missing column");
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    conn.execute(&sql, [])?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name=?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
