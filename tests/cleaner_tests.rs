use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;

use drive_trash_cleaner::drive::{FileMeta, MockDrive};
use drive_trash_cleaner::{
    ApiError, Cleaner, CleanerOptions, Cursor, CursorStore, DeleteMode, Error, ProgressReporter,
    RequestExecutor, RunOutcome, ScanOptions, SilentReporter,
};

fn no_sleep(_: Duration) {}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> String {
    (now() - chrono::Duration::days(days))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn trashed(name: &str) -> FileMeta {
    FileMeta {
        name: name.to_string(),
        parents: vec!["root".to_string()],
        explicitly_trashed: true,
        owned_by_me: true,
    }
}

fn cleaner(store: &CursorStore, mode: DeleteMode) -> Cleaner {
    let options = CleanerOptions {
        scan: ScanOptions {
            retention_days: 30,
            timeout: Duration::from_secs(300),
            ..ScanOptions::default()
        },
        mode,
        run_retries: 3,
        run_retry_interval: Duration::from_secs(2),
    };
    let executor = RequestExecutor::new(Duration::from_secs(2)).with_sleep(no_sleep);
    Cleaner::new(options, store.clone(), executor)
        .with_sleep(no_sleep)
        .with_now(now())
}

fn never_asked(_: usize) -> io::Result<bool> {
    panic!("confirmation should not be requested")
}

/// Three old trashed files followed by one trashed ten days ago.
fn seeded_drive() -> MockDrive {
    let drive = MockDrive::new();
    drive.push_change("old1", days_ago(90), trashed("one.txt"));
    drive.push_change("old2", days_ago(60), trashed("two.txt"));
    drive.push_change("old3", days_ago(45), trashed("three.txt"));
    drive.push_change("recent", days_ago(10), trashed("recent.txt"));
    drive
}

#[test]
fn test_end_to_end_deletes_old_files_and_commits_after_cursor() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = seeded_drive();

    let outcome = cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &SilentReporter, &never_asked)
        .unwrap();

    // All four changes sit on the page starting at 1, so that is where the
    // ten-day-old change will be looked at again.
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            found: 3,
            all_deleted: true,
            cursor: Cursor::new(1),
        }
    );
    assert_eq!(drive.deleted_ids(), vec!["old3", "old2", "old1"]);
    assert_eq!(store.load().unwrap(), Cursor::new(1));
    assert!(!drive.was_deleted("recent"));
}

#[test]
fn test_cursor_after_points_at_page_of_recent_change() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = MockDrive::new();
    for i in 0..100 {
        drive.push_change(
            format!("n{}", i),
            days_ago(200),
            FileMeta {
                explicitly_trashed: false,
                ..trashed("n")
            },
        );
    }
    drive.push_change("old1", days_ago(90), trashed("one.txt"));
    drive.push_change("old2", days_ago(60), trashed("two.txt"));
    drive.push_change("old3", days_ago(45), trashed("three.txt"));
    drive.push_change("recent", days_ago(10), trashed("recent.txt"));

    let outcome = cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &SilentReporter, &never_asked)
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            found: 3,
            all_deleted: true,
            cursor: Cursor::new(101),
        }
    );
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "101");
}

#[test]
fn test_view_only_keeps_safe_cursor() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    store.save(Cursor::new(1)).unwrap();
    let drive = seeded_drive();

    let outcome = cleaner(&store, DeleteMode::ViewOnly)
        .run(|| Ok(drive.clone()), &SilentReporter, &never_asked)
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Completed {
            found: 3,
            all_deleted: false,
            ..
        }
    ));
    assert!(drive.deleted_ids().is_empty());
    assert_eq!(store.load().unwrap(), Cursor::new(1));
}

#[test]
fn test_partial_failure_is_replayed_without_deleted_items() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = MockDrive::new();
    drive.push_change("a", days_ago(90), trashed("a"));
    drive.push_change("b", days_ago(80), trashed("b"));
    drive.push_change("c", days_ago(70), trashed("c"));
    drive.fail_delete_for("b");

    let err = cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &SilentReporter, &never_asked)
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 403, .. }));
    assert_eq!(drive.deleted_ids(), vec!["c"]);
    // Only the safe cursor was written.
    assert_eq!(store.load().unwrap(), Cursor::new(1));

    drive.clear_delete_failures();
    let asked = Cell::new(0usize);
    let confirm = |count: usize| -> io::Result<bool> {
        asked.set(count);
        Ok(true)
    };
    let outcome = cleaner(&store, DeleteMode::Confirm)
        .run(|| Ok(drive.clone()), &SilentReporter, &confirm)
        .unwrap();

    // "c" is gone from the feed; "a" and "b" are still found.
    assert_eq!(asked.get(), 2);
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            found: 2,
            all_deleted: true,
            cursor: drive.frontier(),
        }
    );
    assert_eq!(drive.deleted_ids(), vec!["c", "b", "a"]);
}

#[test]
fn test_auth_failures_retry_then_give_up() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    store.save(Cursor::new(7)).unwrap();
    let attempts = Cell::new(0u32);

    let outcome = cleaner(&store, DeleteMode::Auto)
        .run(
            || -> Result<MockDrive, Error> {
                attempts.set(attempts.get() + 1);
                Err(Error::Authentication("invalid_grant".to_string()))
            },
            &SilentReporter,
            &never_asked,
        )
        .unwrap();

    assert_eq!(outcome, RunOutcome::RetriesExhausted);
    assert_eq!(attempts.get(), 3);
    assert_eq!(store.load().unwrap(), Cursor::new(7));
}

#[test]
fn test_connectivity_failure_recovers_on_next_attempt() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = seeded_drive();
    drive.inject_error(ApiError::Connectivity("dns error: no such host".to_string()));

    let outcome = cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &SilentReporter, &never_asked)
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Completed {
            found: 3,
            all_deleted: true,
            ..
        }
    ));
    assert_eq!(drive.call_count("start_page_token"), 2);
}

#[test]
fn test_backend_timeout_aborts_without_retrying_run() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    store.save(Cursor::new(3)).unwrap();
    let drive = seeded_drive();
    // 300s budget at 2s per retry allows 151 attempts.
    drive.inject_transient(200);
    let connects = Cell::new(0u32);

    let outcome = cleaner(&store, DeleteMode::Auto)
        .run(
            || {
                connects.set(connects.get() + 1);
                Ok(drive.clone())
            },
            &SilentReporter,
            &never_asked,
        )
        .unwrap();

    assert_eq!(outcome, RunOutcome::TimedOut);
    assert_eq!(connects.get(), 1);
    assert_eq!(drive.call_count("start_page_token"), 151);
    assert_eq!(store.load().unwrap(), Cursor::new(3));
}

/// Records the run-level notifications a console would act on.
#[derive(Default)]
struct RecordingReporter {
    events: RefCell<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn on_scan_complete(&self, found: usize) {
        self.events.borrow_mut().push(format!("scan_complete {}", found));
    }

    fn on_attempt_failed(&self, attempt: u32, _error: &Error) {
        self.events.borrow_mut().push(format!("attempt_failed {}", attempt));
    }

    fn on_run_aborted(&self, timed_out: bool) {
        self.events.borrow_mut().push(format!("aborted {}", timed_out));
    }

    fn on_run_failed(&self, error: &Error) {
        self.events.borrow_mut().push(format!("failed {}", error));
    }
}

#[test]
fn test_fatal_scan_error_is_reported_before_returning() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = seeded_drive();
    drive.inject_error(ApiError::Status {
        status: 404,
        message: "File not found".to_string(),
    });
    let reporter = RecordingReporter::default();

    let err = cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &reporter, &never_asked)
        .unwrap_err();

    assert!(matches!(err, Error::Remote { status: 404, .. }));
    assert_eq!(
        *reporter.events.borrow(),
        vec!["failed Remote error (404): File not found".to_string()]
    );
    assert!(drive.deleted_ids().is_empty());
}

#[test]
fn test_retried_failure_is_reported_per_attempt() {
    let dir = tempdir().unwrap();
    let store = CursorStore::new(dir.path().join("page_token"));
    let drive = seeded_drive();
    drive.inject_error(ApiError::Auth("Invalid Credentials".to_string()));
    let reporter = RecordingReporter::default();

    cleaner(&store, DeleteMode::Auto)
        .run(|| Ok(drive.clone()), &reporter, &never_asked)
        .unwrap();

    assert_eq!(
        *reporter.events.borrow(),
        vec!["attempt_failed 1".to_string(), "scan_complete 3".to_string()]
    );
}
