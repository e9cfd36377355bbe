#![forbid(unsafe_code)]

mod json;
mod schema;

pub(super) use json::*;
pub(super) use schema::{migrate_sqlite_schema, schema_version};
