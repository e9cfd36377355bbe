#![forbid(unsafe_code)]

use crate::job::RunnerJob;
use crate::policy::TransitionPolicy;
use js_core::StatusPatch;
use serde::{Deserialize, Serialize};

/// Runner notifications the tracker reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Queueing,
    Queued,
    Processing,
    Processed,
    Failed,
    ExceptionOccurred,
    RetryRequested,
    ReleasedAfterException,
    TimedOut,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 9] = [
        Lifecycle::Queueing,
        Lifecycle::Queued,
        Lifecycle::Processing,
        Lifecycle::Processed,
        Lifecycle::Failed,
        Lifecycle::ExceptionOccurred,
        Lifecycle::RetryRequested,
        Lifecycle::ReleasedAfterException,
        Lifecycle::TimedOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Queueing => "queueing",
            Lifecycle::Queued => "queued",
            Lifecycle::Processing => "processing",
            Lifecycle::Processed => "processed",
            Lifecycle::Failed => "failed",
            Lifecycle::ExceptionOccurred => "exception_occurred",
            Lifecycle::RetryRequested => "retry_requested",
            Lifecycle::ReleasedAfterException => "released_after_exception",
            Lifecycle::TimedOut => "timed_out",
        }
    }

    /// Asks `policy` what this notification means for the record.
    pub fn transition(
        self,
        policy: &dyn TransitionPolicy,
        job: &dyn RunnerJob,
        now_ms: i64,
    ) -> Option<StatusPatch> {
        match self {
            Lifecycle::Queueing => policy.queueing(job, now_ms),
            Lifecycle::Queued => policy.queued(job, now_ms),
            Lifecycle::Processing => policy.processing(job, now_ms),
            Lifecycle::Processed => policy.processed(job, now_ms),
            Lifecycle::Failed => policy.failed(job, now_ms),
            Lifecycle::ExceptionOccurred => policy.exception_occurred(job, now_ms),
            Lifecycle::RetryRequested => policy.retry_requested(job, now_ms),
            Lifecycle::ReleasedAfterException => policy.released_after_exception(job, now_ms),
            Lifecycle::TimedOut => policy.timed_out(job, now_ms),
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
