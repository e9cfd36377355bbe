#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_job_statuses_status ON job_statuses(status, updated_at_ms);
        CREATE INDEX IF NOT EXISTS idx_job_statuses_unique ON job_statuses(type, unique_id) WHERE unique_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_job_status_histories_status ON job_status_histories(status);
        CREATE INDEX IF NOT EXISTS idx_job_status_histories_parent ON job_status_histories(job_status_id, id);
        CREATE INDEX IF NOT EXISTS idx_job_locks_expires ON job_locks(expires_at_ms);
"#;
