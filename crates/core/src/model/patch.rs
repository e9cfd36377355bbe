#![forbid(unsafe_code)]

use crate::status::JobStatus;
use serde_json::Value;

/// Partial update of a status record. `None` leaves the column untouched;
/// all provided fields are written in a single statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusPatch {
    pub status: Option<JobStatus>,
    pub status_message: Option<String>,
    pub progress_now: Option<u32>,
    pub progress_max: Option<u32>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub job_id: Option<String>,
    pub queue: Option<String>,
    pub batch_id: Option<String>,
    pub current_step: Option<u32>,
    pub total_jobs: Option<u32>,
    pub chain_id: Option<String>,
    pub attempts: Option<u32>,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
}

impl StatusPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn started_at(mut self, ts_ms: i64) -> Self {
        self.started_at_ms = Some(ts_ms);
        self
    }

    pub fn finished_at(mut self, ts_ms: i64) -> Self {
        self.finished_at_ms = Some(ts_ms);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Whether applying this patch should leave a history row behind.
    pub fn touches_history(&self) -> bool {
        self.status.is_some()
            || self.status_message.is_some()
            || self.progress_now.is_some()
            || self.progress_max.is_some()
    }

    /// Column names carried by the patch, in table order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let flags = [
            (self.status.is_some(), "status"),
            (self.status_message.is_some(), "status_message"),
            (self.progress_now.is_some(), "progress_now"),
            (self.progress_max.is_some(), "progress_max"),
            (self.input.is_some(), "input"),
            (self.output.is_some(), "output"),
            (self.job_id.is_some(), "job_id"),
            (self.queue.is_some(), "queue"),
            (self.batch_id.is_some(), "batch_id"),
            (self.current_step.is_some(), "current_step"),
            (self.total_jobs.is_some(), "total_jobs"),
            (self.chain_id.is_some(), "chain_id"),
            (self.attempts.is_some(), "attempts"),
            (self.started_at_ms.is_some(), "started_at_ms"),
            (self.finished_at_ms.is_some(), "finished_at_ms"),
        ];
        for (present, name) in flags {
            if present {
                out.push(name);
            }
        }
        out
    }
}
