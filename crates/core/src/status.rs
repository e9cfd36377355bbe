#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked job.
///
/// `Finished` and `Failed` are the ended states. Nothing stops a store from
/// moving a record out of them; the updater only refuses `Failed -> Finished`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Executing,
    Finished,
    Failed,
    Retrying,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Executing,
        JobStatus::Finished,
        JobStatus::Failed,
        JobStatus::Retrying,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Executing => "executing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, JobStatusError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(JobStatusError::Empty);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| JobStatusError::Unknown(raw.to_string()))
    }

    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|status| status.as_str()).collect()
    }

    pub fn has_ended(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    pub fn is_queued(self) -> bool {
        self == JobStatus::Queued
    }

    pub fn is_executing(self) -> bool {
        self == JobStatus::Executing
    }

    pub fn is_finished(self) -> bool {
        self == JobStatus::Finished
    }

    pub fn is_failed(self) -> bool {
        self == JobStatus::Failed
    }

    pub fn is_retrying(self) -> bool {
        self == JobStatus::Retrying
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = JobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatusError {
    Empty,
    Unknown(String),
}

impl std::fmt::Display for JobStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "job status must not be empty"),
            Self::Unknown(raw) => write!(
                f,
                "unknown job status '{raw}' (expected queued|executing|finished|failed|retrying)"
            ),
        }
    }
}

impl std::error::Error for JobStatusError {}
