#![forbid(unsafe_code)]

use crate::ids::StatusId;
use crate::status::JobStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row per tracked job instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: StatusId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub progress_now: u32,
    pub progress_max: u32,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub job_id: Option<String>,
    pub queue: Option<String>,
    pub unique_id: Option<String>,
    pub batch_id: Option<String>,
    /// Best-effort position inside a batch; concurrent batch workers can
    /// observe the same processed count, so steps may repeat or skip.
    pub current_step: Option<u32>,
    pub total_jobs: Option<u32>,
    pub chain_id: Option<String>,
    pub attempts: u32,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl StatusRecord {
    pub fn is_ended(&self) -> bool {
        self.status.has_ended()
    }

    /// Progress in percent, `None` until a maximum is known.
    pub fn progress_percentage(&self) -> Option<f64> {
        if self.progress_max == 0 {
            return None;
        }
        Some(f64::from(self.progress_now) * 100.0 / f64::from(self.progress_max))
    }
}

/// Fields for a record that does not exist yet.
///
/// `job_type` may be left empty by callers; the creation path fills it with
/// the job's display name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewStatusRecord {
    pub job_type: Option<String>,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub progress_now: u32,
    pub progress_max: u32,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub job_id: Option<String>,
    pub queue: Option<String>,
    pub unique_id: Option<String>,
    pub batch_id: Option<String>,
    pub current_step: Option<u32>,
    pub total_jobs: Option<u32>,
    pub chain_id: Option<String>,
}

/// Batch membership as reported by the runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchInfo {
    pub id: String,
    pub total_jobs: u32,
    pub processed_jobs: u32,
}

impl BatchInfo {
    /// 1-based position derived from the processed counter. Racy under
    /// concurrent batch processing; treat as approximate.
    pub fn current_step(&self) -> u32 {
        self.processed_jobs.saturating_add(1)
    }
}
