//! Incremental scan of the Drive change feed for long-trashed files.
//!
//! A scan walks the feed forward from a stored cursor and stops at the first change
//! younger than the retention period; the feed is ordered by change time, so nothing
//! after that point can be eligible yet. It returns two resume points:
//!
//! * `cursor_before` sits before the first candidate and is always safe to store.
//! * `cursor_after` sits after everything inspected and may only be stored once every
//!   candidate has been deleted, otherwise the undeleted ones would be skipped forever.

use crate::cursor::Cursor;
use crate::drive::{ChangesQuery, DriveApi, FileMeta};
use crate::error::Error;
use crate::executor::RequestExecutor;
use crate::path_resolver::PathResolver;
use crate::progress::ProgressReporter;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

pub const PAGE_SIZE_LARGE: u32 = 1000;
pub const PAGE_SIZE_SMALL: u32 = 100;
/// Below this distance to the frontier, pages switch to [`PAGE_SIZE_SMALL`].
pub const PAGE_SIZE_SWITCH_THRESHOLD: u64 = 3000;

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// A trashed file old enough to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCandidate {
    pub file_id: String,
    /// Change time as reported by the feed.
    pub trash_time: String,
    /// Bare name, or the full path when path resolution is on.
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub retention_days: u64,
    /// Retry budget handed to every remote call.
    pub timeout: Duration,
    pub full_path: bool,
    /// Ask the feed for the "My Drive" hierarchy only.
    pub my_drive_only: bool,
    /// Only files owned by the caller are candidates.
    pub require_ownership: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            retention_days: 30,
            timeout: Duration::from_secs(300),
            full_path: false,
            my_drive_only: false,
            require_ownership: true,
        }
    }
}

impl ScanOptions {
    fn retention_secs(&self) -> i64 {
        i64::try_from(self.retention_days)
            .unwrap_or(i64::MAX)
            .saturating_mul(SECONDS_PER_DAY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Candidates in ascending trash time.
    pub candidates: Vec<DeletionCandidate>,
    pub cursor_before: Cursor,
    pub cursor_after: Cursor,
}

pub struct ChangeScanner<'a, D: DriveApi + ?Sized> {
    drive: &'a D,
    executor: &'a RequestExecutor,
    options: ScanOptions,
    now: DateTime<Utc>,
}

impl<'a, D: DriveApi + ?Sized> ChangeScanner<'a, D> {
    pub fn new(drive: &'a D, executor: &'a RequestExecutor, options: ScanOptions) -> Self {
        Self {
            drive,
            executor,
            options,
            now: Utc::now(),
        }
    }

    /// Evaluate ages against `now` instead of the wall clock.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Scan forward from `cursor` (unset means the start of the feed).
    pub fn scan(
        &self,
        cursor: Cursor,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanOutcome, Error> {
        let timeout = self.options.timeout;
        let latest = self
            .executor
            .execute(timeout, || self.drive.start_page_token())?;
        let retention_secs = self.options.retention_secs();

        let mut cursor = if cursor.is_unset() { Cursor::START } else { cursor };
        let mut cursor_before = cursor;
        let mut page_size = PAGE_SIZE_LARGE;
        let mut candidates = Vec::new();
        let mut resolver = self
            .options
            .full_path
            .then(|| PathResolver::new(self.drive, self.executor, timeout));

        info!(
            "Scanning changes from {} (frontier {}), retention {} days",
            cursor, latest, self.options.retention_days
        );

        loop {
            if cursor.distance_to(latest) < PAGE_SIZE_SWITCH_THRESHOLD {
                page_size = PAGE_SIZE_SMALL;
            }
            let query = ChangesQuery {
                start: cursor,
                page_size,
                restrict_to_my_drive: self.options.my_drive_only,
            };
            let page = self
                .executor
                .execute(timeout, || self.drive.list_changes(&query))?;
            debug!("Page at {}: {} changes", cursor, page.changes.len());

            for change in &page.changes {
                let changed_at = parse_change_time(&change.time)?;
                if (self.now - changed_at).num_seconds() < retention_secs {
                    debug!(
                        "Change at {} is within retention, stopping at page {}",
                        change.time, cursor
                    );
                    reporter.on_scan_complete(candidates.len());
                    return Ok(ScanOutcome {
                        candidates,
                        cursor_before,
                        cursor_after: cursor,
                    });
                }
                reporter.on_scan_progress(&change.time);

                let file = match &change.file {
                    Some(file) if self.is_candidate(file) => file,
                    _ => continue,
                };
                let display_name = match resolver.as_mut() {
                    Some(resolver) => resolver.resolve(&change.file_id, Some(file))?,
                    None => file.name.clone(),
                };
                let candidate = DeletionCandidate {
                    file_id: change.file_id.clone(),
                    trash_time: change.time.clone(),
                    display_name,
                };
                reporter.on_candidate_found(&candidate);
                candidates.push(candidate);
            }

            match page.next_page_token {
                Some(next) => {
                    cursor = next;
                    if candidates.is_empty() {
                        cursor_before = next;
                    }
                }
                None => {
                    let frontier = page.new_start_page_token.ok_or_else(|| {
                        Error::Decode(
                            "last change page carries no newStartPageToken".to_string(),
                        )
                    })?;
                    if candidates.is_empty() {
                        cursor_before = frontier;
                    }
                    reporter.on_scan_complete(candidates.len());
                    return Ok(ScanOutcome {
                        candidates,
                        cursor_before,
                        cursor_after: frontier,
                    });
                }
            }
        }
    }

    fn is_candidate(&self, file: &FileMeta) -> bool {
        file.explicitly_trashed && (file.owned_by_me || !self.options.require_ownership)
    }
}

/// Parse a feed timestamp (`YYYY-MM-DDTHH:MM:SS[.fff]Z`) as UTC, dropping fractional seconds.
pub fn parse_change_time(time: &str) -> Result<DateTime<Utc>, Error> {
    let whole_seconds = time
        .split('.')
        .next()
        .unwrap_or(time)
        .trim_end_matches('Z');
    NaiveDateTime::parse_from_str(whole_seconds, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::InvalidTimestamp(time.to_string()))
}
