#![forbid(unsafe_code)]

use crate::backend::{LockProvider, LockToken, StatusStore};
use crate::config::TrackerConfig;
use crate::job::TrackableJob;
use js_core::{NewStatusRecord, StatusRecord};
use js_storage::StoreError;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::time::Instant;

const LOCK_KEY_PREFIX: &str = "job_status:unique:";

/// Lease name guarding creation of `(job_type, unique_id)`.
pub fn unique_lock_key(job_type: &str, unique_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(unique_id.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(LOCK_KEY_PREFIX.len() + digest.len() * 2);
    out.push_str(LOCK_KEY_PREFIX);
    for b in digest {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Held lease; released on drop, whatever path leaves the critical section.
struct LockGuard<'a> {
    locks: &'a dyn LockProvider,
    token: LockToken,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        match self.locks.release(&self.token) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(lock_key = self.token.key(), "creation lock expired before release")
            }
            Err(err) => {
                tracing::warn!(lock_key = self.token.key(), error = %err, "creation lock release failed")
            }
        }
    }
}

/// Creates at most one record per uniqueness key. Every failure ends in
/// `None`: the job then runs untracked.
pub(crate) struct CreationGuard<'a> {
    pub(crate) store: &'a dyn StatusStore,
    pub(crate) locks: &'a dyn LockProvider,
    pub(crate) config: &'a TrackerConfig,
}

impl CreationGuard<'_> {
    pub(crate) fn create<J>(&self, job: &J, mut fields: NewStatusRecord) -> Option<StatusRecord>
    where
        J: TrackableJob + ?Sized,
    {
        let job_type = fields
            .job_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| job.display_name().trim().to_string());

        // The caller's key wins over the job's. Blank keys fail closed.
        let unique_id = match fields.unique_id.take() {
            Some(unique_id) => Some(unique_id),
            None => match job.unique_id() {
                None => None,
                Some(Ok(unique_id)) => Some(unique_id),
                Some(Err(err)) => {
                    tracing::warn!(job_type = job_type.as_str(), error = %err, "unique id unavailable; job runs untracked");
                    return None;
                }
            },
        };
        let unique_id = unique_id.map(|raw| raw.trim().to_string());
        if unique_id.as_deref() == Some("") {
            tracing::warn!(job_type = job_type.as_str(), "unique id is blank; job runs untracked");
            return None;
        }

        let result = match unique_id.as_deref() {
            None => self
                .store
                .create(&build_record(job, fields, &job_type, None))
                .map(Some),
            Some(unique_id) => self.create_unique(job, fields, &job_type, unique_id),
        };
        match result {
            Ok(Some(created)) => {
                tracing::info!(status_id = %created.id, job_type = job_type.as_str(), "tracking job");
                Some(created)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::error!(job_type = job_type.as_str(), error = %err, "status record creation failed; job runs untracked");
                None
            }
        }
    }

    fn create_unique<J>(
        &self,
        job: &J,
        fields: NewStatusRecord,
        job_type: &str,
        unique_id: &str,
    ) -> Result<Option<StatusRecord>, StoreError>
    where
        J: TrackableJob + ?Sized,
    {
        let key = unique_lock_key(job_type, unique_id);
        let Some(_guard) = self.acquire(&key)? else {
            tracing::warn!(job_type, unique_id, lock_key = key.as_str(), "creation lock contended; job runs untracked");
            return Ok(None);
        };

        if let Some(existing) = self.store.find_active_by_unique(job_type, unique_id)? {
            tracing::debug!(status_id = %existing.id, job_type, unique_id, "adopting active record");
            return Ok(Some(existing));
        }
        let record = build_record(job, fields, job_type, Some(unique_id));
        self.store.create(&record).map(Some)
    }

    fn acquire(&self, key: &str) -> Result<Option<LockGuard<'_>>, StoreError> {
        let deadline = Instant::now() + self.config.lock_wait();
        loop {
            if let Some(token) = self.locks.acquire(key, self.config.lock_ttl())? {
                return Ok(Some(LockGuard {
                    locks: self.locks,
                    token,
                }));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.config.lock_retry().min(deadline - now));
        }
    }
}

/// Caller-supplied fields win; the job fills what the caller left empty.
fn build_record<J>(
    job: &J,
    mut fields: NewStatusRecord,
    job_type: &str,
    unique_id: Option<&str>,
) -> NewStatusRecord
where
    J: TrackableJob + ?Sized,
{
    fields.job_type = Some(job_type.to_string());
    fields.unique_id = unique_id.map(str::to_string);
    if fields.batch_id.is_none() {
        match job.batch() {
            Some(Ok(batch)) => {
                fields.current_step = Some(batch.current_step());
                fields.total_jobs = Some(batch.total_jobs);
                fields.batch_id = Some(batch.id);
            }
            Some(Err(err)) => {
                tracing::debug!(job_type, error = %err, "batch unavailable; skipping batch fields")
            }
            None => {}
        }
    }
    fields
}
