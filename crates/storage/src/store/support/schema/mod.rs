#![forbid(unsafe_code)]

mod migrations;
mod sql;

use super::super::StoreError;
use rusqlite::{Connection, OptionalExtension, params};

const SCHEMA_VERSION: &str = "v1";

pub(in crate::store) fn migrate_sqlite_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&sql::tables_sql())?;

    // Older databases predate some columns; indexes may reference them.
    migrations::apply(conn)?;

    conn.execute_batch(sql::indexes_sql())?;

    conn.execute(
        r#"
        INSERT INTO meta(key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value=excluded.value
        "#,
        params!["schema_version", SCHEMA_VERSION],
    )?;

    Ok(())
}

pub(in crate::store) fn schema_version(conn: &Connection) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT value FROM meta WHERE key=?1",
            params!["schema_version"],
            |row| row.get(0),
        )
        .optional()?)
}
