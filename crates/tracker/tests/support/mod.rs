#![forbid(unsafe_code)]
#![allow(dead_code)]

use js_tracker::{
    BatchInfo, HistoryRow, JobError, LocalLocks, NewHistoryRow, NewStatusRecord, RunnerError,
    RunnerJob, SqliteBackend, StatusId, StatusPatch, StatusRecord, StatusStore, StoreError,
    TrackableJob, Tracker, TrackerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("js_tracker_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub(crate) fn memory_config() -> TrackerConfig {
    TrackerConfig {
        model: "memory".to_string(),
        ..TrackerConfig::default()
    }
}

/// In-memory tracker plus a handle on its backend for assertions.
pub(crate) fn memory_tracker(config: TrackerConfig) -> (Tracker, Arc<SqliteBackend>) {
    let backend = Arc::new(SqliteBackend::in_memory().expect("open backend"));
    let tracker = Tracker::builder(config)
        .store(backend.clone())
        .locks(backend.clone())
        .build()
        .expect("build tracker");
    (tracker, backend)
}

pub(crate) fn record_count(backend: &SqliteBackend) -> u64 {
    backend
        .with_store(|store| store.status_counts())
        .expect("counts")
        .total()
}

pub(crate) struct PlainJob;

impl TrackableJob for PlainJob {}

pub(crate) struct NamedJob(pub(crate) &'static str);

impl TrackableJob for NamedJob {
    fn display_name(&self) -> String {
        self.0.to_string()
    }
}

pub(crate) struct UniqueJob {
    pub(crate) key: String,
}

impl UniqueJob {
    pub(crate) const TYPE: &'static str = "unique-job";

    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

impl TrackableJob for UniqueJob {
    fn display_name(&self) -> String {
        Self::TYPE.to_string()
    }

    fn unique_id(&self) -> Option<Result<String, JobError>> {
        Some(Ok(self.key.clone()))
    }
}

/// Declares uniqueness but cannot produce its key.
pub(crate) struct BrokenUniqueJob;

impl TrackableJob for BrokenUniqueJob {
    fn display_name(&self) -> String {
        "broken-unique-job".to_string()
    }

    fn unique_id(&self) -> Option<Result<String, JobError>> {
        Some(Err(JobError::UniqueId("closure cannot be serialized".to_string())))
    }
}

pub(crate) struct BatchedJob {
    pub(crate) batch: BatchInfo,
}

impl TrackableJob for BatchedJob {
    fn display_name(&self) -> String {
        "batched-job".to_string()
    }

    fn batch(&self) -> Option<Result<BatchInfo, JobError>> {
        Some(Ok(self.batch.clone()))
    }
}

/// Runner-side stand-in; every answer is configurable.
#[derive(Clone, Debug)]
pub(crate) struct FakeRunnerJob {
    pub(crate) status_id: Result<Option<StatusId>, RunnerError>,
    pub(crate) job_id: Option<String>,
    pub(crate) queue: Option<String>,
    pub(crate) attempts: Result<u32, RunnerError>,
    pub(crate) command_attempts: Result<u32, RunnerError>,
    pub(crate) max_tries: Option<u32>,
    pub(crate) failed: bool,
}

impl FakeRunnerJob {
    pub(crate) fn for_status(id: Option<StatusId>) -> Self {
        Self {
            status_id: Ok(id),
            job_id: Some("runner-17".to_string()),
            queue: Some("default".to_string()),
            attempts: Ok(1),
            command_attempts: Err(RunnerError::Unavailable("command attempts")),
            max_tries: Some(3),
            failed: false,
        }
    }

    pub(crate) fn attempt(mut self, attempts: u32, max_tries: u32) -> Self {
        self.attempts = Ok(attempts);
        self.max_tries = Some(max_tries);
        self
    }
}

impl RunnerJob for FakeRunnerJob {
    fn job_id(&self) -> Option<String> {
        self.job_id.clone()
    }

    fn queue(&self) -> Option<String> {
        self.queue.clone()
    }

    fn attempts(&self) -> Result<u32, RunnerError> {
        self.attempts.clone()
    }

    fn max_tries(&self) -> Option<u32> {
        self.max_tries
    }

    fn has_failed(&self) -> bool {
        self.failed
    }

    fn status_id(&self) -> Result<Option<StatusId>, RunnerError> {
        self.status_id.clone()
    }

    fn command_attempts(&self) -> Result<u32, RunnerError> {
        self.command_attempts.clone()
    }
}

/// Store whose every operation fails.
pub(crate) struct FailingStore;

impl StatusStore for FailingStore {
    fn create(&self, _record: &NewStatusRecord) -> Result<StatusRecord, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }

    fn find(&self, _id: StatusId) -> Result<Option<StatusRecord>, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }

    fn find_active_by_unique(
        &self,
        _job_type: &str,
        _unique_id: &str,
    ) -> Result<Option<StatusRecord>, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }

    fn update(
        &self,
        _id: StatusId,
        _patch: &StatusPatch,
    ) -> Result<Option<StatusRecord>, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }

    fn append_history(&self, _row: &NewHistoryRow) -> Result<HistoryRow, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }

    fn history(&self, _id: StatusId, _limit: usize) -> Result<Vec<HistoryRow>, StoreError> {
        Err(StoreError::InvalidInput("store offline"))
    }
}

pub(crate) fn failing_tracker() -> (Tracker, Arc<LocalLocks>) {
    let locks = Arc::new(LocalLocks::new());
    let tracker = Tracker::builder(memory_config())
        .store(Arc::new(FailingStore))
        .locks(locks.clone())
        .build()
        .expect("build tracker");
    (tracker, locks)
}
