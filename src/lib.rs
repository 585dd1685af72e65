//! Permanently delete Google Drive files that have been in the trash longer than a
//! retention period, by walking the Drive change feed incrementally.

pub mod cleaner;
pub mod committer;
pub mod config;
pub mod credentials;
pub mod cursor;
pub mod drive;
pub mod error;
pub mod executor;
pub mod path_resolver;
pub mod progress;
pub mod scanner;

#[cfg(test)]
mod test_support;

pub use cleaner::{Cleaner, CleanerOptions, RunOutcome};
pub use committer::{Confirmer, DeleteMode, DeletionCommitter};
pub use config::AppConfig;
pub use cursor::{Cursor, CursorStore};
pub use error::{ApiError, Error};
pub use executor::RequestExecutor;
pub use progress::{ProgressReporter, SilentReporter};
pub use scanner::{ChangeScanner, DeletionCandidate, ScanOptions, ScanOutcome};
