#![forbid(unsafe_code)]

use crate::backend::{LocalLocks, LockProvider, SqliteBackend, StatusStore};
use crate::config::{MODEL_MEMORY, MODEL_SQLITE, TrackerConfig};
use crate::error::TrackerError;
use crate::guard::CreationGuard;
use crate::job::{RunnerJob, TrackableJob};
use crate::lifecycle::Lifecycle;
use crate::policy::{TransitionPolicy, builtin_policy};
use crate::clock::{now_ms_i64, ts_ms_to_rfc3339};
use crate::tracked::{Tracked, TrackingState};
use crate::updater::StatusUpdater;
use js_core::ids::StatusId;
use js_core::{HistoryRow, NewStatusRecord, StatusPatch, StatusRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Wires a store, a lock provider and a transition policy together.
pub struct TrackerBuilder {
    config: TrackerConfig,
    store: Option<Arc<dyn StatusStore>>,
    locks: Option<Arc<dyn LockProvider>>,
    policies: BTreeMap<String, Arc<dyn TransitionPolicy>>,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            store: None,
            locks: None,
            policies: BTreeMap::new(),
        }
    }

    pub fn store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn locks(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Makes `policy` selectable through `event_manager = name`.
    pub fn policy(mut self, name: impl Into<String>, policy: Arc<dyn TransitionPolicy>) -> Self {
        self.policies.insert(name.into().trim().to_string(), policy);
        self
    }

    /// Resolves the policy once. Without an explicit store, `model` picks a
    /// built-in one: `memory`, or `sqlite` at `database_connection`.
    pub fn build(self) -> Result<Tracker, TrackerError> {
        self.config.validate()?;
        let policy = resolve_policy(&self.config.event_manager, &self.policies)?;

        let (store, locks) = match (self.store, self.locks) {
            (Some(store), Some(locks)) => (store, locks),
            (Some(store), None) => (store, Arc::new(LocalLocks::new()) as Arc<dyn LockProvider>),
            (None, locks) => {
                let backend = Arc::new(open_backend(&self.config, None)?);
                let locks = locks.unwrap_or_else(|| backend.clone() as Arc<dyn LockProvider>);
                (backend as Arc<dyn StatusStore>, locks)
            }
        };

        let config = Arc::new(self.config);
        tracing::info!(
            model = config.model.as_str(),
            policy = policy.name(),
            track_history = config.track_history,
            "job status tracker ready"
        );
        Ok(Tracker {
            updater: StatusUpdater::new(store.clone(), config.clone()),
            config,
            store,
            locks,
            policy,
        })
    }
}

fn resolve_policy(
    name: &str,
    registered: &BTreeMap<String, Arc<dyn TransitionPolicy>>,
) -> Result<Arc<dyn TransitionPolicy>, TrackerError> {
    let name = name.trim();
    if let Some(policy) = registered.get(name) {
        return Ok(policy.clone());
    }
    builtin_policy(name).ok_or_else(|| TrackerError::UnknownPolicy(name.to_string()))
}

fn open_backend(
    config: &TrackerConfig,
    primary_dir: Option<&Path>,
) -> Result<SqliteBackend, TrackerError> {
    match config.model.as_str() {
        MODEL_MEMORY => Ok(SqliteBackend::in_memory()?),
        MODEL_SQLITE => {
            let dir = config
                .database_connection
                .as_deref()
                .or(primary_dir)
                .ok_or_else(|| {
                    TrackerError::Config("database_connection is required for sqlite".to_string())
                })?;
            Ok(SqliteBackend::open(dir)?)
        }
        other => Err(TrackerError::Config(format!("unknown model '{other}'"))),
    }
}

/// Entry point for job authors and runner integrations.
pub struct Tracker {
    config: Arc<TrackerConfig>,
    store: Arc<dyn StatusStore>,
    locks: Arc<dyn LockProvider>,
    policy: Arc<dyn TransitionPolicy>,
    updater: StatusUpdater,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}

impl Tracker {
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    /// Built-in store under `database_connection`, or `primary_dir` when
    /// none is configured. Store and locks share one database.
    pub fn open(config: TrackerConfig, primary_dir: impl AsRef<Path>) -> Result<Self, TrackerError> {
        config.validate()?;
        let backend = Arc::new(open_backend(&config, Some(primary_dir.as_ref()))?);
        TrackerBuilder::new(config)
            .store(backend.clone())
            .locks(backend)
            .build()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn updater(&self) -> &StatusUpdater {
        &self.updater
    }

    /// Creates (or adopts) the job's status record and attaches tracking.
    /// Never fails: the job comes back untracked when creation is refused.
    pub fn prepare<J: TrackableJob>(&self, job: J, fields: NewStatusRecord) -> Tracked<J> {
        let guard = CreationGuard {
            store: self.store.as_ref(),
            locks: self.locks.as_ref(),
            config: &self.config,
        };
        let state = match guard.create(&job, fields) {
            Some(record) => TrackingState::for_record(&record),
            None => TrackingState::untracked(),
        };
        self.attach(job, state)
    }

    pub fn track<J: TrackableJob>(&self, job: J) -> Tracked<J> {
        self.prepare(job, NewStatusRecord::default())
    }

    /// Attaches tracking without creating a record; every update is a no-op.
    pub fn untracked<J>(&self, job: J) -> Tracked<J> {
        self.attach(job, TrackingState::untracked())
    }

    /// Reattaches state carried across a process boundary.
    pub fn resume<J>(&self, job: J, state: TrackingState) -> Tracked<J> {
        self.attach(job, state)
    }

    /// In-process execution: create the record and mark it executing.
    pub fn prepare_for_execution<J: TrackableJob>(
        &self,
        job: J,
        fields: NewStatusRecord,
    ) -> Tracked<J> {
        let tracked = self.prepare(job, fields);
        tracked.prepare_for_execution(now_ms_i64());
        tracked
    }

    fn attach<J>(&self, job: J, state: TrackingState) -> Tracked<J> {
        Tracked::new(job, state, self.updater.clone(), self.config.clone())
    }

    /// Feeds one runner notification through the policy and the updater.
    pub fn notify(&self, lifecycle: Lifecycle, job: &dyn RunnerJob) -> Option<StatusRecord> {
        let now_ms = now_ms_i64();
        let patch = lifecycle.transition(self.policy.as_ref(), job, now_ms)?;
        tracing::debug!(
            lifecycle = lifecycle.as_str(),
            at = %ts_ms_to_rfc3339(now_ms),
            "lifecycle notification"
        );
        self.updater.update_event(job, patch)
    }

    /// Stores the runner-assigned id once the job has been enqueued.
    pub fn dispatched<J>(&self, tracked: &Tracked<J>, job_id: &str) -> Option<StatusRecord> {
        tracked.update(StatusPatch {
            job_id: Some(job_id.to_string()),
            ..StatusPatch::default()
        })
    }

    pub fn status(&self, id: StatusId) -> Result<Option<StatusRecord>, TrackerError> {
        Ok(self.store.find(id)?)
    }

    pub fn history(&self, id: StatusId, limit: usize) -> Result<Vec<HistoryRow>, TrackerError> {
        Ok(self.store.history(id, limit)?)
    }
}
