#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// In-memory progress counters of a tracked job.
///
/// The counters always move; the returned flag only says whether the new
/// value is a checkpoint worth writing to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounter {
    now: u32,
    max: u32,
}

impl ProgressCounter {
    pub fn new(now: u32, max: u32) -> Self {
        Self { now, max }
    }

    pub fn now(&self) -> u32 {
        self.now
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn set_max(&mut self, value: u32) {
        self.max = value;
    }

    /// Records `value` and reports whether it should be persisted: every
    /// `every`-th value, plus the value equal to the maximum.
    pub fn set_now(&mut self, value: u32, every: i64) -> bool {
        let every = normalize_every(every);
        let persist = u64::from(value) % every == 0 || value == self.max;
        self.now = value;
        persist
    }

    /// Advances from the latest in-memory value, persisted or not.
    pub fn increment(&mut self, offset: u32, every: i64) -> (u32, bool) {
        let value = self.now.saturating_add(offset);
        let persist = self.set_now(value, every);
        (value, persist)
    }
}

fn normalize_every(every: i64) -> u64 {
    if every <= 0 { 1 } else { every as u64 }
}
