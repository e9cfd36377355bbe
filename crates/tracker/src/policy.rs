#![forbid(unsafe_code)]

use crate::job::RunnerJob;
use js_core::{JobStatus, StatusPatch};
use std::sync::Arc;

/// Maps runner notifications to record updates. `None` means the
/// notification leaves the record alone.
///
/// Only the failure signals differ between the shipped policies, so every
/// other notification has a shared default.
pub trait TransitionPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Creation already wrote the queued record.
    fn queueing(&self, _job: &dyn RunnerJob, _now_ms: i64) -> Option<StatusPatch> {
        None
    }

    fn queued(&self, _job: &dyn RunnerJob, _now_ms: i64) -> Option<StatusPatch> {
        None
    }

    fn processing(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch {
            job_id: job.job_id(),
            queue: job.queue(),
            ..StatusPatch::with_status(JobStatus::Executing).started_at(now_ms)
        })
    }

    fn processed(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        if job.has_failed() {
            return None;
        }
        Some(StatusPatch::with_status(JobStatus::Finished).finished_at(now_ms))
    }

    fn failed(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch>;

    fn exception_occurred(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch>;

    fn retry_requested(&self, _job: &dyn RunnerJob, _now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch::with_status(JobStatus::Retrying))
    }

    fn released_after_exception(&self, _job: &dyn RunnerJob, _now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch::with_status(JobStatus::Retrying))
    }

    fn timed_out(&self, _job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch::with_status(JobStatus::Failed).finished_at(now_ms))
    }
}

/// Terminal `failed` once the attempt budget is spent, `retrying` before.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrictPolicy;

impl StrictPolicy {
    /// A job without a retry limit gets one try. An unreadable attempt count
    /// is treated as "may still retry".
    pub fn failure_status(job: &dyn RunnerJob) -> JobStatus {
        let max_tries = job.max_tries().unwrap_or(1);
        match job.attempts() {
            Ok(attempts) if attempts >= max_tries => JobStatus::Failed,
            Ok(_) => JobStatus::Retrying,
            Err(err) => {
                tracing::debug!(error = %err, "attempt count unavailable; assuming retry");
                JobStatus::Retrying
            }
        }
    }
}

impl TransitionPolicy for StrictPolicy {
    fn name(&self) -> &str {
        "strict"
    }

    fn failed(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch::with_status(Self::failure_status(job)).finished_at(now_ms))
    }

    fn exception_occurred(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        self.failed(job, now_ms)
    }
}

/// Every failure signal reports `retrying`; only a timeout is final.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyPolicy;

impl TransitionPolicy for LegacyPolicy {
    fn name(&self) -> &str {
        "legacy"
    }

    fn failed(&self, _job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        Some(StatusPatch::with_status(JobStatus::Retrying).finished_at(now_ms))
    }

    fn exception_occurred(&self, job: &dyn RunnerJob, now_ms: i64) -> Option<StatusPatch> {
        self.failed(job, now_ms)
    }
}

/// Policies selectable by name without registration. `default` is strict.
pub fn builtin_policy(name: &str) -> Option<Arc<dyn TransitionPolicy>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "default" | "strict" => Some(Arc::new(StrictPolicy)),
        "legacy" => Some(Arc::new(LegacyPolicy)),
        _ => None,
    }
}
