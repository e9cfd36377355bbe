#![forbid(unsafe_code)]

use crate::error::{JobError, RunnerError};
use js_core::BatchInfo;
use js_core::ids::StatusId;

/// What the tracker needs to know about a job before it runs.
pub trait TrackableJob {
    /// Stored as the record's `type`. Defaults to the Rust type path.
    fn display_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Deduplication key. `None` means the job is not unique; an error
    /// aborts record creation and the job runs untracked.
    fn unique_id(&self) -> Option<Result<String, JobError>> {
        None
    }

    /// Batch membership, if the job was dispatched as part of one.
    fn batch(&self) -> Option<Result<BatchInfo, JobError>> {
        None
    }
}

/// Runner-side view of a job while a lifecycle notification is delivered.
pub trait RunnerJob {
    fn job_id(&self) -> Option<String>;

    fn queue(&self) -> Option<String>;

    fn attempts(&self) -> Result<u32, RunnerError>;

    /// `None` when the job has no retry limit configured.
    fn max_tries(&self) -> Option<u32>;

    fn has_failed(&self) -> bool;

    /// Status record id recovered from the job payload. `Ok(None)` when the
    /// job was never tracked.
    fn status_id(&self) -> Result<Option<StatusId>, RunnerError>;

    /// Attempt count as seen by the job itself, consulted when the runner
    /// cannot answer [`RunnerJob::attempts`].
    fn command_attempts(&self) -> Result<u32, RunnerError> {
        Err(RunnerError::Unavailable("command attempts"))
    }
}
