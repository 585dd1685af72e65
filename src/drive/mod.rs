//! Remote side of the cleaner: the Drive change feed, file lookups and deletes.

pub mod http;
pub mod mock;

use crate::cursor::Cursor;
use crate::error::ApiError;
use serde::Deserialize;

pub use http::HttpDrive;
pub use mock::MockDrive;

/// Field mask for change pages; only what classification needs.
pub const CHANGE_FIELDS: &str = concat!(
    "nextPageToken,newStartPageToken,",
    "changes(fileId,time,file(name,parents,explicitlyTrashed,ownedByMe))"
);

/// The subset of file metadata the cleaner looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub explicitly_trashed: bool,
    #[serde(default)]
    pub owned_by_me: bool,
}

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub file_id: String,
    /// RFC 3339 time of the change, e.g. `2017-03-04T11:22:33.123Z`.
    pub time: String,
    #[serde(default)]
    pub file: Option<FileMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePage {
    #[serde(default)]
    pub next_page_token: Option<Cursor>,
    /// Present on the last page only: where the next scan should start.
    #[serde(default)]
    pub new_start_page_token: Option<Cursor>,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangesQuery {
    pub start: Cursor,
    pub page_size: u32,
    pub restrict_to_my_drive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChildEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildPage {
    #[serde(default)]
    pub files: Vec<ChildEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Remote operations used by the scanner, path resolver and committer.
///
/// Implementations make exactly one request per call and never retry;
/// retrying is [`crate::executor::RequestExecutor`]'s job.
pub trait DriveApi {
    /// Current frontier of the change feed.
    fn start_page_token(&self) -> Result<Cursor, ApiError>;

    fn list_changes(&self, query: &ChangesQuery) -> Result<ChangePage, ApiError>;

    fn get_file(&self, file_id: &str) -> Result<FileMeta, ApiError>;

    /// Trashed direct children of `parent_id`, one page at a time.
    fn list_trashed_children(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ChildPage, ApiError>;

    /// Permanently delete a file, bypassing the trash.
    fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;
}
