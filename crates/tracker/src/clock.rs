#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) use js_storage::now_ms as now_ms_i64;

const EPOCH_RFC3339: &str = "1970-01-01T00:00:00Z";

/// Log rendering of a stored timestamp; out-of-range values print as the epoch.
pub(crate) fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ts_ms) * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| EPOCH_RFC3339.to_string())
}
