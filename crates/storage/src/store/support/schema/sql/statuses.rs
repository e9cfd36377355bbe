#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS job_statuses (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          type TEXT NOT NULL,
          status TEXT NOT NULL DEFAULT 'queued'
            CHECK (status IN ('queued','executing','finished','failed','retrying')),
          status_message TEXT,
          progress_now INTEGER NOT NULL DEFAULT 0,
          progress_max INTEGER NOT NULL DEFAULT 0,
          input_json TEXT,
          output_json TEXT,
          job_id TEXT,
          queue TEXT,
          unique_id TEXT,
          batch_id TEXT,
          current_step INTEGER,
          total_jobs INTEGER,
          chain_id TEXT,
          attempts INTEGER NOT NULL DEFAULT 0,
          started_at_ms INTEGER,
          finished_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
