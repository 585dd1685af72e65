//! One cleaning run: scan, checkpoint, delete, checkpoint again.

use crate::committer::{Confirmer, DeleteMode, DeletionCommitter};
use crate::cursor::{Cursor, CursorStore};
use crate::drive::DriveApi;
use crate::error::Error;
use crate::executor::RequestExecutor;
use crate::progress::ProgressReporter;
use crate::scanner::{ChangeScanner, ScanOptions};
use chrono::{DateTime, Utc};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CleanerOptions {
    pub scan: ScanOptions,
    pub mode: DeleteMode,
    /// Attempts of the whole run on authentication or connection failures.
    pub run_retries: u32,
    pub run_retry_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        found: usize,
        /// Every candidate is gone and the cursor moved past them.
        all_deleted: bool,
        /// Cursor left in the store.
        cursor: Cursor,
    },
    /// Authentication or connection kept failing.
    RetriesExhausted,
    /// The backend kept returning errors for longer than the timeout.
    TimedOut,
}

struct Attempt {
    found: usize,
    all_deleted: bool,
    cursor_before: Cursor,
    cursor_after: Cursor,
}

pub struct Cleaner {
    options: CleanerOptions,
    store: CursorStore,
    executor: RequestExecutor,
    sleep: fn(Duration),
    now: Option<DateTime<Utc>>,
}

impl Cleaner {
    pub fn new(options: CleanerOptions, store: CursorStore, executor: RequestExecutor) -> Self {
        Self {
            options,
            store,
            executor,
            sleep: thread::sleep,
            now: None,
        }
    }

    /// Replace the pause between whole-run attempts.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Evaluate trash ages against a fixed time.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Run with up to `run_retries` attempts. `connect` builds a fresh authenticated
    /// client for each attempt, and every attempt resumes from the stored cursor.
    pub fn run<D, C>(
        &self,
        mut connect: C,
        reporter: &dyn ProgressReporter,
        confirmer: &dyn Confirmer,
    ) -> Result<RunOutcome, Error>
    where
        D: DriveApi,
        C: FnMut() -> Result<D, Error>,
    {
        let retries = self.options.run_retries.max(1);
        let mut completed = None;
        for attempt in 1..=retries {
            match self.attempt(&mut connect, reporter, confirmer) {
                Ok(done) => {
                    completed = Some(done);
                    break;
                }
                Err(Error::Timeout) => {
                    warn!(attempt, "Backend timeout, aborting run");
                    reporter.on_run_aborted(true);
                    return Ok(RunOutcome::TimedOut);
                }
                Err(err) if err.is_retryable_run() => {
                    warn!(attempt, "Run attempt failed: {}", err);
                    reporter.on_attempt_failed(attempt, &err);
                    if attempt < retries {
                        (self.sleep)(self.options.run_retry_interval);
                    }
                }
                Err(err) => {
                    warn!(attempt, "Run failed: {}", err);
                    reporter.on_run_failed(&err);
                    return Err(err);
                }
            }
        }

        let done = match completed {
            Some(done) => done,
            None => {
                reporter.on_run_aborted(false);
                return Ok(RunOutcome::RetriesExhausted);
            }
        };

        let cursor = if done.all_deleted {
            self.store.save(done.cursor_after)?;
            info!("Committed cursor {}", done.cursor_after);
            done.cursor_after
        } else {
            done.cursor_before
        };
        Ok(RunOutcome::Completed {
            found: done.found,
            all_deleted: done.all_deleted,
            cursor,
        })
    }

    fn attempt<D, C>(
        &self,
        connect: &mut C,
        reporter: &dyn ProgressReporter,
        confirmer: &dyn Confirmer,
    ) -> Result<Attempt, Error>
    where
        D: DriveApi,
        C: FnMut() -> Result<D, Error>,
    {
        let drive = connect()?;
        let cursor = self.store.load()?;

        let mut scanner = ChangeScanner::new(&drive, &self.executor, self.options.scan.clone());
        if let Some(now) = self.now {
            scanner = scanner.with_now(now);
        }
        let outcome = scanner.scan(cursor, reporter)?;

        // Always safe: replaying from here rediscovers every candidate.
        self.store.save(outcome.cursor_before)?;
        info!(
            "Saved cursor {} ({} candidates, {} pending)",
            outcome.cursor_before,
            outcome.candidates.len(),
            outcome.cursor_after
        );

        let committer = DeletionCommitter::new(
            &drive,
            &self.executor,
            self.options.mode,
            self.options.scan.timeout,
            self.options.scan.retention_days,
        );
        let all_deleted = committer.commit(&outcome.candidates, reporter, confirmer)?;

        Ok(Attempt {
            found: outcome.candidates.len(),
            all_deleted,
            cursor_before: outcome.cursor_before,
            cursor_after: outcome.cursor_after,
        })
    }
}
