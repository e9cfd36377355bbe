#![forbid(unsafe_code)]

use js_storage::StoreError;

/// Startup and read-side failures. Tracking paths never return these.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unknown transition policy '{0}'")]
    UnknownPolicy(String),
}

/// Failure reported by a job while describing itself.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("unique id unavailable: {0}")]
    UniqueId(String),
    #[error("batch unavailable: {0}")]
    Batch(String),
}

/// Failure reported by the queue runner while answering a lookup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RunnerError {
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error("payload: {0}")]
    Payload(String),
}
