#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockLeaseRow {
    pub key: String,
    pub owner: String,
    pub acquired_at_ms: i64,
    pub expires_at_ms: i64,
}
