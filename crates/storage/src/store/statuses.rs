#![forbid(unsafe_code)]

use super::support::{decode_json, encode_json};
use super::*;
use js_core::ids::StatusId;
use js_core::{JobStatus, NewStatusRecord, StatusPatch, StatusRecord};
use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, params, params_from_iter};

const MAX_TYPE_LEN: usize = 255;
const MAX_IDENT_LEN: usize = 255;
const MAX_STATUS_MESSAGE_BYTES: usize = 64 * 1024;
const MAX_LIST_LIMIT: usize = 200;

const STATUS_COLUMNS: &str = r#"
  id, type, status, status_message, progress_now, progress_max, input_json, output_json,
  job_id, queue, unique_id, batch_id, current_step, total_jobs, chain_id, attempts,
  started_at_ms, finished_at_ms, created_at_ms, updated_at_ms
"#;

fn normalize_job_type(raw: Option<&str>) -> Result<String, StoreError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("job_status.type must not be empty"));
    }
    if raw.len() > MAX_TYPE_LEN {
        return Err(StoreError::InvalidInput("job_status.type is too long"));
    }
    Ok(raw.to_string())
}

fn normalize_ident(raw: Option<&str>, too_long: &'static str) -> Result<Option<String>, StoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if raw.len() > MAX_IDENT_LEN {
        return Err(StoreError::InvalidInput(too_long));
    }
    Ok(Some(raw.to_string()))
}

fn normalize_status_message(raw: Option<&str>) -> Result<Option<String>, StoreError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.len() > MAX_STATUS_MESSAGE_BYTES {
        return Err(StoreError::InvalidInput("job_status.status_message is too long"));
    }
    Ok(Some(raw.to_string()))
}

pub(super) fn parse_status_column(raw: String, column: usize) -> Result<JobStatus, rusqlite::Error> {
    JobStatus::parse(&raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn read_status_row(row: &rusqlite::Row<'_>) -> Result<StatusRecord, rusqlite::Error> {
    Ok(StatusRecord {
        id: StatusId::new(row.get(0)?),
        job_type: row.get(1)?,
        status: parse_status_column(row.get(2)?, 2)?,
        status_message: row.get(3)?,
        progress_now: row.get(4)?,
        progress_max: row.get(5)?,
        input: decode_json(row.get(6)?, 6)?,
        output: decode_json(row.get(7)?, 7)?,
        job_id: row.get(8)?,
        queue: row.get(9)?,
        unique_id: row.get(10)?,
        batch_id: row.get(11)?,
        current_step: row.get(12)?,
        total_jobs: row.get(13)?,
        chain_id: row.get(14)?,
        attempts: row.get(15)?,
        started_at_ms: row.get(16)?,
        finished_at_ms: row.get(17)?,
        created_at_ms: row.get(18)?,
        updated_at_ms: row.get(19)?,
    })
}

fn get_status_tx(
    conn: &rusqlite::Connection,
    id: StatusId,
) -> Result<Option<StatusRecord>, StoreError> {
    let sql = format!("SELECT {STATUS_COLUMNS} FROM job_statuses WHERE id=?1");
    Ok(conn
        .query_row(&sql, params![id.get()], read_status_row)
        .optional()?)
}

struct PatchSql {
    assignments: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl PatchSql {
    fn push(&mut self, assignment: &'static str, value: SqlValue) {
        self.assignments.push(assignment);
        self.values.push(value);
    }
}

fn text(value: Option<String>) -> SqlValue {
    value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn build_patch_sql(patch: &StatusPatch) -> Result<PatchSql, StoreError> {
    let mut out = PatchSql {
        assignments: Vec::new(),
        values: Vec::new(),
    };
    if let Some(status) = patch.status {
        out.push("status", SqlValue::Text(status.as_str().to_string()));
    }
    if patch.status_message.is_some() {
        let message = normalize_status_message(patch.status_message.as_deref())?;
        out.push("status_message", text(message));
    }
    if let Some(value) = patch.progress_now {
        out.push("progress_now", SqlValue::Integer(i64::from(value)));
    }
    if let Some(value) = patch.progress_max {
        out.push("progress_max", SqlValue::Integer(i64::from(value)));
    }
    if patch.input.is_some() {
        out.push("input_json", text(encode_json(patch.input.as_ref())?));
    }
    if patch.output.is_some() {
        out.push("output_json", text(encode_json(patch.output.as_ref())?));
    }
    if patch.job_id.is_some() {
        let job_id = normalize_ident(patch.job_id.as_deref(), "job_status.job_id is too long")?;
        out.push("job_id", text(job_id));
    }
    if patch.queue.is_some() {
        let queue = normalize_ident(patch.queue.as_deref(), "job_status.queue is too long")?;
        out.push("queue", text(queue));
    }
    if patch.batch_id.is_some() {
        let batch_id =
            normalize_ident(patch.batch_id.as_deref(), "job_status.batch_id is too long")?;
        out.push("batch_id", text(batch_id));
    }
    if let Some(value) = patch.current_step {
        out.push("current_step", SqlValue::Integer(i64::from(value)));
    }
    if let Some(value) = patch.total_jobs {
        out.push("total_jobs", SqlValue::Integer(i64::from(value)));
    }
    if patch.chain_id.is_some() {
        let chain_id =
            normalize_ident(patch.chain_id.as_deref(), "job_status.chain_id is too long")?;
        out.push("chain_id", text(chain_id));
    }
    if let Some(value) = patch.attempts {
        out.push("attempts", SqlValue::Integer(i64::from(value)));
    }
    if let Some(ts_ms) = patch.started_at_ms {
        out.push("started_at_ms", SqlValue::Integer(ts_ms));
    }
    if let Some(ts_ms) = patch.finished_at_ms {
        out.push("finished_at_ms", SqlValue::Integer(ts_ms));
    }
    Ok(out)
}

impl SqliteStore {
    pub fn status_create(&mut self, record: &NewStatusRecord) -> Result<StatusRecord, StoreError> {
        let now_ms = now_ms();
        let job_type = normalize_job_type(record.job_type.as_deref())?;
        let job_id = normalize_ident(record.job_id.as_deref(), "job_status.job_id is too long")?;
        let queue = normalize_ident(record.queue.as_deref(), "job_status.queue is too long")?;
        let unique_id = normalize_ident(
            record.unique_id.as_deref(),
            "job_status.unique_id is too long",
        )?;
        let batch_id =
            normalize_ident(record.batch_id.as_deref(), "job_status.batch_id is too long")?;
        let chain_id =
            normalize_ident(record.chain_id.as_deref(), "job_status.chain_id is too long")?;
        let status_message = normalize_status_message(record.status_message.as_deref())?;
        let input_json = encode_json(record.input.as_ref())?;
        let output_json = encode_json(record.output.as_ref())?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO job_statuses(
              type, status, status_message, progress_now, progress_max, input_json, output_json,
              job_id, queue, unique_id, batch_id, current_step, total_jobs, chain_id, attempts,
              started_at_ms, finished_at_ms, created_at_ms, updated_at_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, NULL, NULL, ?15, ?16)
            "#,
            params![
                job_type,
                record.status.as_str(),
                status_message,
                record.progress_now,
                record.progress_max,
                input_json,
                output_json,
                job_id,
                queue,
                unique_id,
                batch_id,
                record.current_step,
                record.total_jobs,
                chain_id,
                now_ms,
                now_ms,
            ],
        )?;
        let id = StatusId::new(tx.last_insert_rowid());
        let created = get_status_tx(&tx, id)?.ok_or(StoreError::UnknownId)?;
        tx.commit()?;
        Ok(created)
    }

    pub fn status_get(&self, id: StatusId) -> Result<Option<StatusRecord>, StoreError> {
        get_status_tx(&self.conn, id)
    }

    /// Writes every field carried by `patch` in one statement and returns the
    /// resulting record, or `None` when the id is unknown.
    pub fn status_update(
        &mut self,
        id: StatusId,
        patch: &StatusPatch,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let PatchSql {
            assignments,
            mut values,
        } = build_patch_sql(patch)?;
        if assignments.is_empty() {
            return self.status_get(id);
        }

        let mut set_clause = assignments
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column}=?{}", index + 1))
            .collect::<Vec<_>>();
        set_clause.push(format!("updated_at_ms=?{}", values.len() + 1));
        values.push(SqlValue::Integer(now_ms()));
        values.push(SqlValue::Integer(id.get()));
        let sql = format!(
            "UPDATE job_statuses SET {} WHERE id=?{}",
            set_clause.join(", "),
            values.len()
        );

        let tx = self.conn.transaction()?;
        let changed = tx.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Ok(None);
        }
        let updated = get_status_tx(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Deletes a record together with its history rows.
    pub fn status_delete(&mut self, id: StatusId) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM job_statuses WHERE id=?1", params![id.get()])?;
        Ok(changed > 0)
    }

    /// Newest record of `(job_type, unique_id)` that has not ended yet.
    pub fn status_find_active_by_unique(
        &self,
        job_type: &str,
        unique_id: &str,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {STATUS_COLUMNS}
            FROM job_statuses
            WHERE type=?1 AND unique_id=?2 AND status NOT IN ('finished', 'failed')
            ORDER BY id DESC
            LIMIT 1
            "#
        );
        Ok(self
            .conn
            .query_row(&sql, params![job_type.trim(), unique_id.trim()], read_status_row)
            .optional()?)
    }

    pub fn statuses_list(
        &self,
        request: StatusListRequest,
    ) -> Result<StatusListResult, StoreError> {
        let limit = request.limit.clamp(1, MAX_LIST_LIMIT);
        let job_type = request
            .job_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let sql = format!(
            r#"
            SELECT {STATUS_COLUMNS}
            FROM job_statuses
            WHERE (?1 IS NULL OR status=?1)
              AND (?2 IS NULL OR type=?2)
            ORDER BY updated_at_ms DESC, id DESC
            LIMIT ?3
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                request.status.map(JobStatus::as_str),
                job_type,
                (limit + 1) as i64
            ],
            read_status_row,
        )?;
        let mut records = rows.collect::<Result<Vec<_>, _>>()?;

        let has_more = records.len() > limit;
        if has_more {
            records.truncate(limit);
        }
        Ok(StatusListResult { records, has_more })
    }

    pub fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM job_statuses GROUP BY status")?;
        let mut rows = stmt.query([])?;
        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let status = JobStatus::parse(&raw).map_err(|_| StoreError::UnknownStatus(raw))?;
            counts.add(status, count.max(0) as u64);
        }
        Ok(counts)
    }
}
