#![forbid(unsafe_code)]

mod support;

use js_storage::{SqliteStore, StatusListRequest};
use js_tracker::{
    BatchInfo, JobStatus, LocalLocks, LockProvider, NewStatusRecord, SqliteBackend, Tracker,
    TrackerConfig, unique_lock_key,
};
use std::cell::Cell;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use support::*;

#[test]
fn plain_jobs_get_one_record_each() {
    let (tracker, backend) = memory_tracker(memory_config());
    let first = tracker.track(PlainJob);
    let second = tracker.track(PlainJob);

    let first_id = first.job_status_id().expect("first tracked");
    let second_id = second.job_status_id().expect("second tracked");
    assert_ne!(first_id, second_id);
    assert_eq!(record_count(&backend), 2);

    let record = tracker.status(first_id).expect("status").expect("record");
    assert_eq!(record.status, JobStatus::Queued);
    assert!(record.job_type.ends_with("PlainJob"), "{}", record.job_type);
    assert_eq!(record.unique_id, None);
    assert_eq!(record.attempts, 0);
    assert!(tracker.history(first_id, 10).expect("history").is_empty());
}

#[test]
fn caller_fields_win_over_job_defaults() {
    let (tracker, _backend) = memory_tracker(memory_config());
    let tracked = tracker.prepare(
        NamedJob("report"),
        NewStatusRecord {
            job_type: Some("nightly-report".to_string()),
            queue: Some("reports".to_string()),
            status_message: Some("waiting for slot".to_string()),
            progress_max: 40,
            ..NewStatusRecord::default()
        },
    );

    let id = tracked.job_status_id().expect("tracked");
    let record = tracker.status(id).expect("status").expect("record");
    assert_eq!(record.job_type, "nightly-report");
    assert_eq!(record.queue.as_deref(), Some("reports"));
    assert_eq!(record.status_message.as_deref(), Some("waiting for slot"));
    assert_eq!(record.progress_max, 40);

    let named = tracker.track(NamedJob("report"));
    let named = tracker
        .status(named.job_status_id().expect("tracked"))
        .expect("status")
        .expect("record");
    assert_eq!(named.job_type, "report");
}

#[test]
fn unique_job_adopts_active_record_until_it_ends() {
    let (tracker, backend) = memory_tracker(memory_config());
    let first = tracker.track(UniqueJob::new("order-1"));
    let again = tracker.track(UniqueJob::new("order-1"));
    let other = tracker.track(UniqueJob::new("order-2"));

    let id = first.job_status_id().expect("tracked");
    assert_eq!(again.job_status_id(), Some(id));
    assert_ne!(other.job_status_id(), Some(id));
    assert_eq!(record_count(&backend), 2);

    let record = tracker.status(id).expect("status").expect("record");
    assert_eq!(record.unique_id.as_deref(), Some("order-1"));
    assert_eq!(record.job_type, UniqueJob::TYPE);

    first.update(js_tracker::StatusPatch::with_status(JobStatus::Finished));
    let next = tracker.track(UniqueJob::new("order-1"));
    let next_id = next.job_status_id().expect("tracked after finish");
    assert_ne!(next_id, id);
    assert_eq!(record_count(&backend), 3);
}

#[test]
fn creation_lock_is_released_after_creation() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let tracker = Tracker::builder(memory_config())
        .store(backend)
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let tracked = tracker.track(UniqueJob::new("order-1"));
    assert!(tracked.is_tracking());
    assert!(!locks.is_held(&unique_lock_key(UniqueJob::TYPE, "order-1")));
}

#[test]
fn contended_lock_leaves_job_untracked() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let tracker = Tracker::builder(memory_config())
        .store(backend.clone())
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let key = unique_lock_key(UniqueJob::TYPE, "order-1");
    let held = locks
        .acquire(&key, Duration::from_secs(30))
        .expect("acquire")
        .expect("free");

    let tracked = tracker.track(UniqueJob::new("order-1"));
    assert!(!tracked.is_tracking());
    assert_eq!(tracked.job_status_id(), None);
    assert_eq!(record_count(&backend), 0);
    assert!(tracked.set_status_message("still runs").is_none());

    // The refusal is permanent for that instance, even once the lock frees up.
    locks.release(&held).expect("release");
    assert!(tracked.set_status_message("still runs").is_none());
    assert_eq!(record_count(&backend), 0);
}

#[test]
fn bounded_wait_outlasts_a_short_holder() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let config = TrackerConfig {
        lock_wait_ms: 2_000,
        lock_retry_ms: 10,
        ..memory_config()
    };
    let tracker = Tracker::builder(config)
        .store(backend.clone())
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let key = unique_lock_key(UniqueJob::TYPE, "order-1");
    let held = locks
        .acquire(&key, Duration::from_secs(30))
        .expect("acquire")
        .expect("free");
    let releaser = {
        let locks = locks.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            locks.release(&held).expect("release");
        })
    };

    let tracked = tracker.track(UniqueJob::new("order-1"));
    releaser.join().expect("releaser");
    assert!(tracked.is_tracking());
    assert_eq!(record_count(&backend), 1);
}

#[test]
fn padded_unique_key_shares_the_trimmed_lock() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let tracker = Tracker::builder(memory_config())
        .store(backend.clone())
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let held = locks
        .acquire(
            &unique_lock_key(UniqueJob::TYPE, "order-1"),
            Duration::from_secs(30),
        )
        .expect("acquire")
        .expect("free");
    let padded = tracker.track(UniqueJob::new(" order-1 "));
    assert!(!padded.is_tracking());
    assert_eq!(record_count(&backend), 0);

    locks.release(&held).expect("release");
    let first = tracker.track(UniqueJob::new("order-1 "));
    let second = tracker.track(UniqueJob::new("order-1"));
    assert_eq!(first.job_status_id(), second.job_status_id());
    let record = tracker
        .status(first.job_status_id().expect("tracked"))
        .expect("status")
        .expect("record");
    assert_eq!(record.unique_id.as_deref(), Some("order-1"));
    assert_eq!(record_count(&backend), 1);
}

#[test]
fn blank_unique_key_leaves_job_untracked() {
    let (tracker, backend) = memory_tracker(memory_config());
    assert!(!tracker.track(UniqueJob::new("   ")).is_tracking());
    assert!(!tracker.track(UniqueJob::new("")).is_tracking());
    assert_eq!(record_count(&backend), 0);
}

#[test]
fn caller_unique_key_is_the_one_locked() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let tracker = Tracker::builder(memory_config())
        .store(backend.clone())
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let _held = locks
        .acquire(
            &unique_lock_key(UniqueJob::TYPE, "override"),
            Duration::from_secs(30),
        )
        .expect("acquire")
        .expect("free");
    let tracked = tracker.prepare(
        UniqueJob::new("order-1"),
        NewStatusRecord {
            unique_id: Some("override".to_string()),
            ..NewStatusRecord::default()
        },
    );
    assert!(!tracked.is_tracking());
    assert_eq!(record_count(&backend), 0);
}

/// Unique job that notes whether its creation lock was held when the
/// tracker asked for its batch.
struct LockAwareBatchJob {
    locks: Arc<LocalLocks>,
    saw_lock: Cell<Option<bool>>,
}

impl js_tracker::TrackableJob for LockAwareBatchJob {
    fn display_name(&self) -> String {
        "lock-aware-batch".to_string()
    }

    fn unique_id(&self) -> Option<Result<String, js_tracker::JobError>> {
        Some(Ok("batch-slot".to_string()))
    }

    fn batch(&self) -> Option<Result<BatchInfo, js_tracker::JobError>> {
        let key = unique_lock_key("lock-aware-batch", "batch-slot");
        self.saw_lock.set(Some(self.locks.is_held(&key)));
        Some(Ok(BatchInfo {
            id: "batch-1".to_string(),
            total_jobs: 2,
            processed_jobs: 0,
        }))
    }
}

#[test]
fn batch_lookup_runs_inside_the_creation_lock() {
    let locks = Arc::new(LocalLocks::new());
    let backend = Arc::new(SqliteBackend::in_memory().expect("backend"));
    let tracker = Tracker::builder(memory_config())
        .store(backend)
        .locks(locks.clone())
        .build()
        .expect("tracker");

    let tracked = tracker.track(LockAwareBatchJob {
        locks: locks.clone(),
        saw_lock: Cell::new(None),
    });
    assert!(tracked.is_tracking());
    assert_eq!(tracked.job().saw_lock.get(), Some(true));

    // An adopted record never consults the batch.
    let adopted = tracker.track(LockAwareBatchJob {
        locks,
        saw_lock: Cell::new(None),
    });
    assert_eq!(adopted.job_status_id(), tracked.job_status_id());
    assert_eq!(adopted.job().saw_lock.get(), None);
}

#[test]
fn unique_key_failure_aborts_creation() {
    let (tracker, backend) = memory_tracker(memory_config());
    let mut tracked = tracker.track(BrokenUniqueJob);
    assert!(!tracked.is_tracking());
    assert_eq!(record_count(&backend), 0);
    assert!(tracked.set_progress_max(10).is_none());
    assert!(tracked.set_progress_now(10, 1).is_none());
    assert_eq!(record_count(&backend), 0);
}

#[test]
fn store_failure_fails_closed_and_releases_the_lock() {
    let (tracker, locks) = failing_tracker();

    let unique = tracker.track(UniqueJob::new("order-1"));
    assert!(!unique.is_tracking());
    assert!(!locks.is_held(&unique_lock_key(UniqueJob::TYPE, "order-1")));

    let plain = tracker.track(PlainJob);
    assert!(!plain.is_tracking());
    assert!(plain.set_output(serde_json::json!({"rows": 3})).is_none());
}

#[test]
fn batch_fields_come_from_the_runner_batch() {
    let (tracker, _backend) = memory_tracker(memory_config());
    let batch = BatchInfo {
        id: "batch-9".to_string(),
        total_jobs: 10,
        processed_jobs: 4,
    };

    let tracked = tracker.track(BatchedJob {
        batch: batch.clone(),
    });
    let record = tracker
        .status(tracked.job_status_id().expect("tracked"))
        .expect("status")
        .expect("record");
    assert_eq!(record.batch_id.as_deref(), Some("batch-9"));
    assert_eq!(record.total_jobs, Some(10));
    assert_eq!(record.current_step, Some(5));

    let overridden = tracker.prepare(
        BatchedJob { batch },
        NewStatusRecord {
            batch_id: Some("manual".to_string()),
            ..NewStatusRecord::default()
        },
    );
    let record = tracker
        .status(overridden.job_status_id().expect("tracked"))
        .expect("status")
        .expect("record");
    assert_eq!(record.batch_id.as_deref(), Some("manual"));
    assert_eq!(record.current_step, None);
    assert_eq!(record.total_jobs, None);
}

/// Opens one tracker per worker on the same directory and lets them race
/// on a single uniqueness key. Returns what each worker saw plus the stored
/// record id.
fn race_unique_creation(
    test_name: &str,
    config: TrackerConfig,
    workers: usize,
) -> (Vec<Option<js_tracker::StatusId>>, js_tracker::StatusId) {
    let dir = temp_dir(test_name);
    let trackers = (0..workers)
        .map(|_| Tracker::open(config.clone(), &dir).expect("open tracker"))
        .collect::<Vec<_>>();
    let barrier = Arc::new(Barrier::new(workers));

    let handles = trackers
        .into_iter()
        .map(|tracker| {
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                tracker.track(UniqueJob::new("invoice-77")).job_status_id()
            })
        })
        .collect::<Vec<_>>();
    let ids = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker"))
        .collect::<Vec<_>>();

    let store = SqliteStore::open(&dir).expect("reopen");
    let listed = store
        .statuses_list(StatusListRequest {
            job_type: Some(UniqueJob::TYPE.to_string()),
            limit: 50,
            ..StatusListRequest::default()
        })
        .expect("list");
    assert_eq!(listed.records.len(), 1, "ids: {ids:?}");
    (ids, listed.records[0].id)
}

#[test]
fn concurrent_unique_creation_collapses_to_one_record() {
    let (ids, winner) = race_unique_creation("race_single_attempt", TrackerConfig::default(), 8);
    assert!(ids.iter().any(Option::is_some));
    for id in ids.iter().flatten() {
        assert_eq!(*id, winner);
    }
}

#[test]
fn concurrent_unique_creation_with_waiting_all_share_the_record() {
    let config = TrackerConfig {
        lock_wait_ms: 5_000,
        lock_retry_ms: 5,
        ..TrackerConfig::default()
    };
    let (ids, winner) = race_unique_creation("race_waiting", config, 4);
    assert!(ids.iter().all(|id| *id == Some(winner)), "{ids:?}");
}
