#![forbid(unsafe_code)]

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown job status in store: {0}")]
    UnknownStatus(String),
    #[error("unknown id")]
    UnknownId,
}
