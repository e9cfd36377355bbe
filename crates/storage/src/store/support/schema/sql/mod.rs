#![forbid(unsafe_code)]

mod core;
mod history;
mod indexes;
mod locks;
mod statuses;

pub(super) fn tables_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(statuses::SQL);
    sql.push_str(history::SQL);
    sql.push_str(locks::SQL);
    sql
}

pub(super) fn indexes_sql() -> &'static str {
    indexes::SQL
}
