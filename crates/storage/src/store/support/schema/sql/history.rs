#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        -- Append-only; rows go away only with their parent status record.
        CREATE TABLE IF NOT EXISTS job_status_histories (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          job_status_id INTEGER NOT NULL,
          status TEXT NOT NULL,
          status_message TEXT,
          progress_now INTEGER NOT NULL DEFAULT 0,
          progress_max INTEGER NOT NULL DEFAULT 0,
          metadata_json TEXT,
          created_at_ms INTEGER NOT NULL,
          FOREIGN KEY(job_status_id) REFERENCES job_statuses(id) ON DELETE CASCADE
        );
"#;
