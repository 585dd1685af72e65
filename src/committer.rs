use crate::drive::DriveApi;
use crate::error::Error;
use crate::executor::RequestExecutor;
use crate::progress::ProgressReporter;
use crate::scanner::DeletionCandidate;
use std::io;
use std::time::Duration;
use tracing::{debug, info};

/// How the committer treats the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Delete without asking.
    Auto,
    /// Ask once for the whole list.
    Confirm,
    /// Report only, never delete.
    ViewOnly,
}

/// Asks the user whether `count` files may be deleted.
pub trait Confirmer {
    fn confirm(&self, count: usize) -> io::Result<bool>;
}

impl<F> Confirmer for F
where
    F: Fn(usize) -> io::Result<bool>,
{
    fn confirm(&self, count: usize) -> io::Result<bool> {
        self(count)
    }
}

pub struct DeletionCommitter<'a, D: DriveApi + ?Sized> {
    drive: &'a D,
    executor: &'a RequestExecutor,
    mode: DeleteMode,
    timeout: Duration,
    retention_days: u64,
}

impl<'a, D: DriveApi + ?Sized> DeletionCommitter<'a, D> {
    pub fn new(
        drive: &'a D,
        executor: &'a RequestExecutor,
        mode: DeleteMode,
        timeout: Duration,
        retention_days: u64,
    ) -> Self {
        Self {
            drive,
            executor,
            mode,
            timeout,
            retention_days,
        }
    }

    /// Delete every candidate, most recently trashed first.
    ///
    /// Returns `true` only when the list is now fully drained (or was empty), which is
    /// the condition for storing the scan's `cursor_after`. A failed delete aborts with
    /// the error; files deleted before it stay deleted.
    pub fn commit(
        &self,
        candidates: &[DeletionCandidate],
        reporter: &dyn ProgressReporter,
        confirmer: &dyn Confirmer,
    ) -> Result<bool, Error> {
        let count = candidates.len();
        if count == 0 {
            reporter.on_nothing_to_delete();
            return Ok(true);
        }

        match self.mode {
            DeleteMode::ViewOnly => {
                reporter.on_view_only(count, self.retention_days);
                return Ok(false);
            }
            DeleteMode::Confirm => {
                if !confirmer.confirm(count)? {
                    debug!("Deletion of {} files declined", count);
                    return Ok(false);
                }
            }
            DeleteMode::Auto => {}
        }

        reporter.on_delete_start(count);
        for candidate in candidates.iter().rev() {
            self.executor
                .execute(self.timeout, || self.drive.delete_file(&candidate.file_id))?;
            info!("{}    {}", candidate.trash_time, candidate.display_name);
            reporter.on_deleted(candidate);
        }
        reporter.on_delete_complete(count);
        Ok(true)
    }
}
