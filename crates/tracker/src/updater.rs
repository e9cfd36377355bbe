#![forbid(unsafe_code)]

use crate::backend::StatusStore;
use crate::config::TrackerConfig;
use crate::job::RunnerJob;
use js_core::ids::StatusId;
use js_core::{JobStatus, NewHistoryRow, StatusPatch, StatusRecord};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Single write path for existing records. Errors are logged and absorbed:
/// every method returns the record as it stands afterwards, or `None` when
/// nothing could be written.
#[derive(Clone)]
pub struct StatusUpdater {
    store: Arc<dyn StatusStore>,
    config: Arc<TrackerConfig>,
}

impl std::fmt::Debug for StatusUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusUpdater")
            .field("track_history", &self.config.track_history)
            .finish_non_exhaustive()
    }
}

struct RunnerContext {
    attempts: Option<u32>,
    job_id: Option<String>,
    queue: Option<String>,
}

impl StatusUpdater {
    pub fn new(store: Arc<dyn StatusStore>, config: Arc<TrackerConfig>) -> Self {
        Self { store, config }
    }

    /// Update issued by the job itself (progress, messages, payloads).
    pub fn update_job(&self, id: Option<StatusId>, patch: StatusPatch) -> Option<StatusRecord> {
        let id = id?;
        self.apply(id, patch, None)
    }

    /// Update derived from a runner notification. The attempt count is
    /// refreshed from the runner on the way through.
    pub fn update_event(&self, job: &dyn RunnerJob, patch: StatusPatch) -> Option<StatusRecord> {
        let id = match job.status_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::trace!("notification for untracked job");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "status id unreadable from job payload");
                return None;
            }
        };
        let context = RunnerContext {
            attempts: resolve_attempts(job, id),
            job_id: job.job_id(),
            queue: job.queue(),
        };
        self.apply(id, patch, Some(context))
    }

    fn apply(
        &self,
        id: StatusId,
        mut patch: StatusPatch,
        context: Option<RunnerContext>,
    ) -> Option<StatusRecord> {
        let current = match self.store.find(id) {
            Ok(Some(current)) => current,
            Ok(None) => {
                tracing::warn!(status_id = %id, "status record missing; update skipped");
                return None;
            }
            Err(err) => {
                tracing::error!(status_id = %id, error = %err, "status record lookup failed");
                return None;
            }
        };

        // A failure already on record outlives a late success signal.
        if current.status == JobStatus::Failed && patch.status == Some(JobStatus::Finished) {
            tracing::debug!(status_id = %id, "ignoring finished after failed");
            patch.status = None;
        }
        if let Some(attempts) = context.as_ref().and_then(|context| context.attempts) {
            patch.attempts = Some(attempts);
        }
        if patch.is_empty() {
            return Some(current);
        }

        let updated = match self.store.update(id, &patch) {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                tracing::debug!(status_id = %id, "status record vanished during update");
                return None;
            }
            Err(err) => {
                tracing::error!(status_id = %id, error = %err, "status update failed");
                return None;
            }
        };

        if self.config.track_history && patch.touches_history() {
            let metadata = history_metadata(&patch, context.as_ref());
            let row = NewHistoryRow::snapshot(&updated, Some(metadata));
            if let Err(err) = self.store.append_history(&row) {
                tracing::warn!(status_id = %id, error = %err, "history append failed");
            }
        }
        tracing::debug!(status_id = %id, status = %updated.status, "status updated");
        Some(updated)
    }
}

fn resolve_attempts(job: &dyn RunnerJob, id: StatusId) -> Option<u32> {
    match job.attempts() {
        Ok(attempts) => Some(attempts),
        Err(runner_err) => match job.command_attempts() {
            Ok(attempts) => Some(attempts),
            Err(command_err) => {
                tracing::warn!(
                    status_id = %id,
                    runner = %runner_err,
                    command = %command_err,
                    "attempt count unavailable"
                );
                None
            }
        },
    }
}

fn history_metadata(patch: &StatusPatch, context: Option<&RunnerContext>) -> Value {
    let mut out = Map::new();
    out.insert("changed".to_string(), json!(patch.changed_fields()));
    if let Some(context) = context {
        if let Some(attempts) = context.attempts {
            out.insert("attempts".to_string(), json!(attempts));
        }
        if let Some(job_id) = &context.job_id {
            out.insert("job_id".to_string(), json!(job_id));
        }
        if let Some(queue) = &context.queue {
            out.insert("queue".to_string(), json!(queue));
        }
    }
    Value::Object(out)
}
