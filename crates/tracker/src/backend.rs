#![forbid(unsafe_code)]

use js_core::ids::StatusId;
use js_core::{HistoryRow, NewHistoryRow, NewStatusRecord, StatusPatch, StatusRecord};
use js_storage::{SqliteStore, StoreError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Persistence seam for status records and their history.
pub trait StatusStore: Send + Sync {
    fn create(&self, record: &NewStatusRecord) -> Result<StatusRecord, StoreError>;

    fn find(&self, id: StatusId) -> Result<Option<StatusRecord>, StoreError>;

    /// Newest record of `(job_type, unique_id)` that has not ended.
    fn find_active_by_unique(
        &self,
        job_type: &str,
        unique_id: &str,
    ) -> Result<Option<StatusRecord>, StoreError>;

    /// Applies `patch` atomically; `Ok(None)` when the record is gone.
    fn update(&self, id: StatusId, patch: &StatusPatch)
    -> Result<Option<StatusRecord>, StoreError>;

    fn append_history(&self, row: &NewHistoryRow) -> Result<HistoryRow, StoreError>;

    fn history(&self, id: StatusId, limit: usize) -> Result<Vec<HistoryRow>, StoreError>;
}

/// Proof of a held lease, handed back on release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    owner: String,
}

impl LockToken {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

fn new_owner() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Named, expiring, mutually exclusive leases.
pub trait LockProvider: Send + Sync {
    /// Single non-blocking attempt. `Ok(None)` means someone else holds it.
    fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError>;

    fn release(&self, token: &LockToken) -> Result<bool, StoreError>;
}

/// SQLite store behind a mutex. Serves as both record store and lock
/// provider; leases live in the same database file, so separate processes
/// opening the same directory exclude each other.
#[derive(Debug)]
pub struct SqliteBackend {
    store: Mutex<SqliteStore>,
}

impl SqliteBackend {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_store(SqliteStore::open(storage_dir)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_store(SqliteStore::open_in_memory()?))
    }

    pub fn from_store(store: SqliteStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Direct access for reads the trait does not cover (listing, counts).
    pub fn with_store<R>(&self, f: impl FnOnce(&mut SqliteStore) -> R) -> R {
        let mut store = self.store.lock().expect("sqlite store mutex poisoned");
        f(&mut store)
    }
}

impl StatusStore for SqliteBackend {
    fn create(&self, record: &NewStatusRecord) -> Result<StatusRecord, StoreError> {
        self.with_store(|store| store.status_create(record))
    }

    fn find(&self, id: StatusId) -> Result<Option<StatusRecord>, StoreError> {
        self.with_store(|store| store.status_get(id))
    }

    fn find_active_by_unique(
        &self,
        job_type: &str,
        unique_id: &str,
    ) -> Result<Option<StatusRecord>, StoreError> {
        self.with_store(|store| store.status_find_active_by_unique(job_type, unique_id))
    }

    fn update(
        &self,
        id: StatusId,
        patch: &StatusPatch,
    ) -> Result<Option<StatusRecord>, StoreError> {
        self.with_store(|store| store.status_update(id, patch))
    }

    fn append_history(&self, row: &NewHistoryRow) -> Result<HistoryRow, StoreError> {
        self.with_store(|store| store.history_append(row))
    }

    fn history(&self, id: StatusId, limit: usize) -> Result<Vec<HistoryRow>, StoreError> {
        self.with_store(|store| store.history_list(id, limit))
    }
}

impl LockProvider for SqliteBackend {
    fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError> {
        let owner = new_owner();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let acquired = self.with_store(|store| store.lock_acquire(key, &owner, ttl_ms))?;
        Ok(acquired.then(|| LockToken {
            key: key.to_string(),
            owner,
        }))
    }

    fn release(&self, token: &LockToken) -> Result<bool, StoreError> {
        self.with_store(|store| store.lock_release(&token.key, &token.owner))
    }
}

/// Process-local leases for stores that bring no lock table of their own.
#[derive(Debug, Default)]
pub struct LocalLocks {
    held: Mutex<HashMap<String, (String, Instant)>>,
}

impl LocalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        let held = self.held.lock().expect("local locks mutex poisoned");
        held.get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }
}

impl LockProvider for LocalLocks {
    fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidInput("lock key must not be empty"));
        }
        let now = Instant::now();
        let mut held = self.held.lock().expect("local locks mutex poisoned");
        if held.get(key).is_some_and(|(_, expires_at)| *expires_at > now) {
            return Ok(None);
        }
        let owner = new_owner();
        held.insert(key.to_string(), (owner.clone(), now + ttl));
        Ok(Some(LockToken {
            key: key.to_string(),
            owner,
        }))
    }

    fn release(&self, token: &LockToken) -> Result<bool, StoreError> {
        let mut held = self.held.lock().expect("local locks mutex poisoned");
        match held.get(&token.key) {
            Some((owner, _)) if *owner == token.owner => {
                held.remove(&token.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_locks_exclude_until_release() {
        let locks = LocalLocks::new();
        let first = locks
            .acquire("job", Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert!(locks.acquire("job", Duration::from_secs(10)).unwrap().is_none());
        assert!(locks.is_held("job"));

        assert!(locks.release(&first).unwrap());
        assert!(!locks.release(&first).unwrap(), "second release is a no-op");
        assert!(!locks.is_held("job"));
        assert!(locks.acquire("job", Duration::from_secs(10)).unwrap().is_some());
    }

    #[test]
    fn local_locks_reclaim_expired_leases() {
        let locks = LocalLocks::new();
        let stale = locks
            .acquire("job", Duration::from_millis(1))
            .unwrap()
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let fresh = locks
            .acquire("job", Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert!(!locks.release(&stale).unwrap(), "stale owner cannot release");
        assert!(locks.release(&fresh).unwrap());
    }

    #[test]
    fn sqlite_backend_tokens_are_owner_scoped() {
        let backend = SqliteBackend::in_memory().unwrap();
        let token = backend
            .acquire("job", Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert!(backend.acquire("job", Duration::from_secs(10)).unwrap().is_none());
        let holder = backend
            .with_store(|store| store.lock_holder("job"))
            .unwrap()
            .unwrap();
        assert_eq!(holder.owner, token.owner());
        assert!(backend.release(&token).unwrap());
        assert!(backend.acquire("job", Duration::from_secs(10)).unwrap().is_some());
    }
}
