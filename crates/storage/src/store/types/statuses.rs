#![forbid(unsafe_code)]

use js_core::{JobStatus, StatusRecord};

#[derive(Clone, Debug, Default)]
pub struct StatusListRequest {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub limit: usize,
}

#[derive(Clone, Debug)]
pub struct StatusListResult {
    pub records: Vec<StatusRecord>,
    pub has_more: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: u64,
    pub executing: u64,
    pub finished: u64,
    pub failed: u64,
    pub retrying: u64,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Executing => self.executing,
            JobStatus::Finished => self.finished,
            JobStatus::Failed => self.failed,
            JobStatus::Retrying => self.retrying,
        }
    }

    pub fn total(&self) -> u64 {
        JobStatus::ALL.iter().map(|status| self.get(*status)).sum()
    }

    pub(in crate::store) fn add(&mut self, status: JobStatus, count: u64) {
        let slot = match status {
            JobStatus::Queued => &mut self.queued,
            JobStatus::Executing => &mut self.executing,
            JobStatus::Finished => &mut self.finished,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Retrying => &mut self.retrying,
        };
        *slot += count;
    }
}
