#![forbid(unsafe_code)]

mod statuses;
mod util;

use super::super::super::StoreError;
use rusqlite::Connection;

pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    statuses::apply(conn)?;
    Ok(())
}
