#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS job_locks (
          key TEXT PRIMARY KEY,
          owner TEXT NOT NULL,
          acquired_at_ms INTEGER NOT NULL,
          expires_at_ms INTEGER NOT NULL
        );
"#;
