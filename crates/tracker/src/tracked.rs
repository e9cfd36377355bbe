#![forbid(unsafe_code)]

use crate::config::TrackerConfig;
use crate::updater::StatusUpdater;
use js_core::ids::StatusId;
use js_core::{JobStatus, ProgressCounter, StatusPatch, StatusRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tracking data that travels with a job, e.g. inside its queue payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingState {
    pub status_id: Option<StatusId>,
    pub progress: ProgressCounter,
    pub should_track: bool,
}

impl TrackingState {
    pub fn tracked(status_id: StatusId) -> Self {
        Self {
            status_id: Some(status_id),
            progress: ProgressCounter::default(),
            should_track: true,
        }
    }

    /// Tracking for a created or adopted record, progress seeded from it.
    pub fn for_record(record: &StatusRecord) -> Self {
        Self {
            progress: ProgressCounter::new(record.progress_now, record.progress_max),
            ..Self::tracked(record.id)
        }
    }

    pub fn untracked() -> Self {
        Self {
            status_id: None,
            progress: ProgressCounter::default(),
            should_track: false,
        }
    }

    /// Record id when tracking is live, `None` otherwise.
    pub fn active_id(&self) -> Option<StatusId> {
        if self.should_track { self.status_id } else { None }
    }
}

/// A job with its tracking state attached.
///
/// Every setter is infallible from the job's point of view: when tracking is
/// off, or the store misbehaves, the call does nothing (beyond logging).
#[derive(Debug)]
pub struct Tracked<J> {
    job: J,
    state: TrackingState,
    updater: StatusUpdater,
    config: Arc<TrackerConfig>,
}

impl<J> Tracked<J> {
    pub(crate) fn new(
        job: J,
        state: TrackingState,
        updater: StatusUpdater,
        config: Arc<TrackerConfig>,
    ) -> Self {
        Self {
            job,
            state,
            updater,
            config,
        }
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut J {
        &mut self.job
    }

    pub fn into_inner(self) -> J {
        self.job
    }

    /// Splits off the state so it can be stored alongside the job payload
    /// and handed back to [`crate::Tracker::resume`] later.
    pub fn into_parts(self) -> (J, TrackingState) {
        (self.job, self.state)
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn job_status_id(&self) -> Option<StatusId> {
        self.state.active_id()
    }

    pub fn is_tracking(&self) -> bool {
        self.job_status_id().is_some()
    }

    pub fn progress(&self) -> ProgressCounter {
        self.state.progress
    }

    /// Always written through.
    pub fn set_progress_max(&mut self, value: u32) -> Option<StatusRecord> {
        self.state.progress.set_max(value);
        self.update(StatusPatch {
            progress_max: Some(value),
            ..StatusPatch::default()
        })
    }

    /// Written through every `every`-th value and at the maximum; other
    /// values stay in memory. `every <= 0` writes every value.
    pub fn set_progress_now(&mut self, value: u32, every: i64) -> Option<StatusRecord> {
        if !self.state.progress.set_now(value, every) {
            return None;
        }
        self.update(StatusPatch {
            progress_now: Some(value),
            ..StatusPatch::default()
        })
    }

    /// Advances from the latest in-memory value, persisted or not.
    pub fn increment_progress(&mut self, offset: u32, every: i64) -> Option<StatusRecord> {
        let (value, persist) = self.state.progress.increment(offset, every);
        if !persist {
            return None;
        }
        self.update(StatusPatch {
            progress_now: Some(value),
            ..StatusPatch::default()
        })
    }

    pub fn set_input(&self, value: Value) -> Option<StatusRecord> {
        if !self.config.track_input {
            return None;
        }
        self.update(StatusPatch {
            input: Some(value),
            ..StatusPatch::default()
        })
    }

    pub fn set_output(&self, value: Value) -> Option<StatusRecord> {
        if !self.config.track_output {
            return None;
        }
        self.update(StatusPatch {
            output: Some(value),
            ..StatusPatch::default()
        })
    }

    pub fn set_status_message(&self, message: impl Into<String>) -> Option<StatusRecord> {
        self.update(StatusPatch {
            status_message: Some(message.into()),
            ..StatusPatch::default()
        })
    }

    /// Records chain membership. Steps are 1-based and best effort.
    pub fn set_chain(
        &self,
        chain_id: impl Into<String>,
        current_step: u32,
        total_jobs: u32,
    ) -> Option<StatusRecord> {
        self.update(StatusPatch {
            chain_id: Some(chain_id.into()),
            current_step: Some(current_step),
            total_jobs: Some(total_jobs),
            ..StatusPatch::default()
        })
    }

    /// Marks the record as executing when the job is run in-process instead
    /// of through a runner that emits a processing notification.
    pub fn prepare_for_execution(&self, now_ms: i64) -> Option<StatusRecord> {
        self.update(StatusPatch::with_status(JobStatus::Executing).started_at(now_ms))
    }

    pub fn update(&self, patch: StatusPatch) -> Option<StatusRecord> {
        self.updater.update_job(self.job_status_id(), patch)
    }
}
