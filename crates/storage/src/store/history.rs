#![forbid(unsafe_code)]

use super::statuses::parse_status_column;
use super::support::{decode_json, encode_json};
use super::*;
use js_core::ids::StatusId;
use js_core::{HistoryRow, NewHistoryRow};
use rusqlite::params;

const MAX_HISTORY_LIMIT: usize = 1_000;

fn read_history_row(row: &rusqlite::Row<'_>) -> Result<HistoryRow, rusqlite::Error> {
    Ok(HistoryRow {
        id: row.get(0)?,
        job_status_id: StatusId::new(row.get(1)?),
        status: parse_status_column(row.get(2)?, 2)?,
        status_message: row.get(3)?,
        progress_now: row.get(4)?,
        progress_max: row.get(5)?,
        metadata: decode_json(row.get(6)?, 6)?,
        created_at_ms: row.get(7)?,
    })
}

impl SqliteStore {
    pub fn history_append(&mut self, row: &NewHistoryRow) -> Result<HistoryRow, StoreError> {
        let now_ms = now_ms();
        let metadata_json = encode_json(row.metadata.as_ref())?;
        let changed = self.conn.execute(
            r#"
            INSERT INTO job_status_histories(
              job_status_id, status, status_message, progress_now, progress_max, metadata_json, created_at_ms
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
            WHERE EXISTS (SELECT 1 FROM job_statuses WHERE id=?1)
            "#,
            params![
                row.job_status_id.get(),
                row.status.as_str(),
                row.status_message,
                row.progress_now,
                row.progress_max,
                metadata_json,
                now_ms,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }

        Ok(HistoryRow {
            id: self.conn.last_insert_rowid(),
            job_status_id: row.job_status_id,
            status: row.status,
            status_message: row.status_message.clone(),
            progress_now: row.progress_now,
            progress_max: row.progress_max,
            metadata: row.metadata.clone(),
            created_at_ms: now_ms,
        })
    }

    /// History of one record, oldest first.
    pub fn history_list(
        &self,
        job_status_id: StatusId,
        limit: usize,
    ) -> Result<Vec<HistoryRow>, StoreError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, job_status_id, status, status_message, progress_now, progress_max,
                   metadata_json, created_at_ms
            FROM job_status_histories
            WHERE job_status_id=?1
            ORDER BY id ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![job_status_id.get(), limit as i64], read_history_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn history_count(&self, job_status_id: StatusId) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM job_status_histories WHERE job_status_id=?1",
            params![job_status_id.get()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
