#![forbid(unsafe_code)]

use crate::ids::StatusId;
use crate::status::JobStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable snapshot appended after a persisted status change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: i64,
    pub job_status_id: StatusId,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub progress_now: u32,
    pub progress_max: u32,
    pub metadata: Option<Value>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewHistoryRow {
    pub job_status_id: StatusId,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub progress_now: u32,
    pub progress_max: u32,
    pub metadata: Option<Value>,
}

impl NewHistoryRow {
    /// Snapshot of the record as it stands after an update.
    pub fn snapshot(record: &crate::StatusRecord, metadata: Option<Value>) -> Self {
        Self {
            job_status_id: record.id,
            status: record.status,
            status_message: record.status_message.clone(),
            progress_now: record.progress_now,
            progress_max: record.progress_max,
            metadata,
        }
    }
}
