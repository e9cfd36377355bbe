#![forbid(unsafe_code)]

use super::*;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

const MAX_LOCK_KEY_LEN: usize = 255;
const MAX_LOCK_OWNER_LEN: usize = 128;
const MAX_LOCK_TTL_MS: u64 = 300_000; // 5 minutes
const MIN_LOCK_TTL_MS: u64 = 1_000; // 1 second

fn normalize_lock_key(raw: &str) -> Result<&str, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("lock key must not be empty"));
    }
    if raw.len() > MAX_LOCK_KEY_LEN {
        return Err(StoreError::InvalidInput("lock key is too long"));
    }
    Ok(raw)
}

fn normalize_lock_owner(raw: &str) -> Result<&str, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("lock owner must not be empty"));
    }
    if raw.len() > MAX_LOCK_OWNER_LEN {
        return Err(StoreError::InvalidInput("lock owner is too long"));
    }
    Ok(raw)
}

impl SqliteStore {
    /// Takes the lease on `key` for `owner` unless another owner holds an
    /// unexpired one. Expired leases are reclaimed in the same transaction.
    pub fn lock_acquire(&mut self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        let key = normalize_lock_key(key)?;
        let owner = normalize_lock_owner(owner)?;
        let ttl_ms = ttl_ms.clamp(MIN_LOCK_TTL_MS, MAX_LOCK_TTL_MS);
        let now_ms = now_ms();
        let expires_at_ms = now_ms.saturating_add(ttl_ms as i64);

        // IMMEDIATE takes the write lock up front so two connections cannot
        // both observe the key as free.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM job_locks WHERE key=?1 AND expires_at_ms<=?2",
            params![key, now_ms],
        )?;
        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO job_locks(key, owner, acquired_at_ms, expires_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![key, owner, now_ms, expires_at_ms],
        )?;
        tx.commit()?;
        Ok(inserted == 1)
    }

    /// Drops the lease if `owner` still holds it.
    pub fn lock_release(&mut self, key: &str, owner: &str) -> Result<bool, StoreError> {
        let key = normalize_lock_key(key)?;
        let owner = normalize_lock_owner(owner)?;
        let changed = self.conn.execute(
            "DELETE FROM job_locks WHERE key=?1 AND owner=?2",
            params![key, owner],
        )?;
        Ok(changed > 0)
    }

    /// Current unexpired lease on `key`, if any.
    pub fn lock_holder(&self, key: &str) -> Result<Option<LockLeaseRow>, StoreError> {
        let key = normalize_lock_key(key)?;
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT key, owner, acquired_at_ms, expires_at_ms
                FROM job_locks
                WHERE key=?1 AND expires_at_ms>?2
                "#,
                params![key, now_ms()],
                |row| {
                    Ok(LockLeaseRow {
                        key: row.get(0)?,
                        owner: row.get(1)?,
                        acquired_at_ms: row.get(2)?,
                        expires_at_ms: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}
