use crate::error::Error;
use crate::scanner::DeletionCandidate;

/// Trait for reporting scan and deletion progress.
///
/// The CLI implements it with indicatif and plain console output.
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    /// Called for every change old enough to be inspected, with its RFC 3339 time.
    fn on_scan_progress(&self, _change_time: &str) {}
    fn on_candidate_found(&self, _candidate: &DeletionCandidate) {}
    fn on_scan_complete(&self, _found: usize) {}

    fn on_nothing_to_delete(&self) {}
    /// View-only mode: `count` files would have been deleted.
    fn on_view_only(&self, _count: usize, _retention_days: u64) {}
    fn on_delete_start(&self, _count: usize) {}
    fn on_deleted(&self, _candidate: &DeletionCandidate) {}
    fn on_delete_complete(&self, _count: usize) {}

    /// An attempt of the whole run failed and may be retried.
    fn on_attempt_failed(&self, _attempt: u32, _error: &Error) {}
    /// The run gave up; `timed_out` tells a backend timeout apart from exhausted retries.
    fn on_run_aborted(&self, _timed_out: bool) {}
    /// The run stopped on an error that is not retried; it is returned to the caller.
    fn on_run_failed(&self, _error: &Error) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
