#![forbid(unsafe_code)]

//! Status tracking for queued jobs.
//!
//! A [`Tracker`] creates one status record per tracked job, guarded by a short
//! lock when the job declares a uniqueness key. Runner lifecycle notifications
//! become record updates through a [`TransitionPolicy`]; each persisted status
//! change can leave a history row behind. Tracking failures are logged and
//! absorbed, they never surface to the job itself.

mod backend;
mod clock;
mod config;
mod error;
mod guard;
mod job;
mod lifecycle;
mod policy;
mod tracked;
mod tracker;
mod updater;

pub use backend::{LocalLocks, LockProvider, LockToken, SqliteBackend, StatusStore};
pub use config::TrackerConfig;
pub use error::{JobError, RunnerError, TrackerError};
pub use guard::unique_lock_key;
pub use job::{RunnerJob, TrackableJob};
pub use lifecycle::Lifecycle;
pub use policy::{LegacyPolicy, StrictPolicy, TransitionPolicy, builtin_policy};
pub use tracked::{Tracked, TrackingState};
pub use tracker::{Tracker, TrackerBuilder};
pub use updater::StatusUpdater;

pub use js_core::ids::StatusId;
pub use js_core::{
    BatchInfo, HistoryRow, JobStatus, NewHistoryRow, NewStatusRecord, ProgressCounter, StatusPatch, StatusRecord,
};
pub use js_storage::StoreError;
