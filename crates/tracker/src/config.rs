#![forbid(unsafe_code)]

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_EVENT_MANAGER: &str = "JOB_STATUS_EVENT_MANAGER";
const ENV_DATABASE_CONNECTION: &str = "JOB_STATUS_DATABASE_CONNECTION";
const ENV_TRACK_INPUT: &str = "JOB_STATUS_TRACK_INPUT";
const ENV_TRACK_OUTPUT: &str = "JOB_STATUS_TRACK_OUTPUT";
const ENV_TRACK_HISTORY: &str = "JOB_STATUS_TRACK_HISTORY";

pub(crate) const MODEL_SQLITE: &str = "sqlite";
pub(crate) const MODEL_MEMORY: &str = "memory";

/// Engine configuration. Every field has a default, so an empty mapping is a
/// valid config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Built-in record store: `sqlite` (file backed) or `memory`.
    pub model: String,
    /// Transition policy name: `default`, `strict`, `legacy`, or a name
    /// registered on the builder.
    pub event_manager: String,
    /// Dedicated storage directory for status records. Falls back to the
    /// directory passed to [`crate::Tracker::open`].
    pub database_connection: Option<PathBuf>,
    pub track_input: bool,
    pub track_output: bool,
    pub track_history: bool,
    pub lock_ttl_ms: u64,
    /// How long creation waits for a contended uniqueness lock. Zero means a
    /// single attempt.
    pub lock_wait_ms: u64,
    pub lock_retry_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SQLITE.to_string(),
            event_manager: "default".to_string(),
            database_connection: None,
            track_input: true,
            track_output: true,
            track_history: true,
            lock_ttl_ms: 10_000,
            lock_wait_ms: 0,
            lock_retry_ms: 25,
        }
    }
}

impl TrackerConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Applies `JOB_STATUS_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, TrackerError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `JOB_STATUS_*` overrides read through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TrackerError> {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(value) = lookup(ENV_EVENT_MANAGER) {
            self.event_manager = value;
        }
        if let Some(value) = lookup(ENV_DATABASE_CONNECTION) {
            self.database_connection = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_TRACK_INPUT) {
            self.track_input = parse_flag(ENV_TRACK_INPUT, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACK_OUTPUT) {
            self.track_output = parse_flag(ENV_TRACK_OUTPUT, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACK_HISTORY) {
            self.track_history = parse_flag(ENV_TRACK_HISTORY, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.event_manager.trim().is_empty() {
            return Err(TrackerError::Config(
                "event_manager must not be empty".to_string(),
            ));
        }
        match self.model.as_str() {
            MODEL_SQLITE | MODEL_MEMORY => {}
            other => {
                return Err(TrackerError::Config(format!(
                    "unknown model '{other}' (expected sqlite or memory)"
                )));
            }
        }
        if self.lock_ttl_ms == 0 {
            return Err(TrackerError::Config("lock_ttl_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms.max(1))
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, TrackerError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TrackerError::Config(format!(
            "{name} must be a boolean, got '{raw}'"
        ))),
    }
}
