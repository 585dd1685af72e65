use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::{ChangePage, ChangeRecord, ChangesQuery, ChildEntry, ChildPage, DriveApi, FileMeta};
use crate::cursor::Cursor;
use crate::error::ApiError;

/// Internal state for MockDrive.
///
/// Groups all mutable state into a single struct for simplified locking.
#[derive(Default)]
struct MockState {
    /// Current metadata of every known file.
    files: HashMap<String, FileMeta>,
    /// Change feed, position `i + 1` is `log[i]`: (file id, change time).
    log: Vec<(String, String)>,
    /// Files removed with `delete_file`.
    deleted: Vec<String>,
    /// Errors returned by the next calls, whatever the operation.
    injected: VecDeque<ApiError>,
    /// Files whose deletion fails permanently.
    fail_delete_ids: HashSet<String>,
    /// Calls per operation name.
    calls: HashMap<&'static str, usize>,
    child_page_size: Option<usize>,
}

/// In-memory Drive for tests.
///
/// Deleted files drop out of later change pages, the same way the real feed hides
/// removed files when `includeRemoved=false`.
#[derive(Clone, Default)]
pub struct MockDrive {
    state: Arc<Mutex<MockState>>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file without appending to the change feed (e.g. a folder).
    pub fn add_file(&self, id: impl Into<String>, meta: FileMeta) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(id.into(), meta);
    }

    /// Record a change for `id` at `time` and set its current metadata.
    pub fn push_change(&self, id: impl Into<String>, time: impl Into<String>, meta: FileMeta) {
        let id = id.into();
        let mut state = self.state.lock().unwrap();
        state.files.insert(id.clone(), meta);
        state.log.push((id, time.into()));
    }

    /// Append a change that carries no file resource.
    pub fn push_bare_change(&self, id: impl Into<String>, time: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.log.push((id.into(), time.into()));
    }

    /// Fail the next call (any operation) with `err`. Errors queue up in order.
    pub fn inject_error(&self, err: ApiError) {
        let mut state = self.state.lock().unwrap();
        state.injected.push_back(err);
    }

    /// Queue `count` backend errors.
    pub fn inject_transient(&self, count: usize) {
        for _ in 0..count {
            self.inject_error(ApiError::Transient {
                status: 500,
                message: "Backend Error".into(),
            });
        }
    }

    /// Make deletion of `id` fail with a permission error.
    pub fn fail_delete_for(&self, id: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.fail_delete_ids.insert(id.into());
    }

    pub fn clear_delete_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_delete_ids.clear();
    }

    /// Limit the number of children per `list_trashed_children` page.
    pub fn set_child_page_size(&self, size: usize) {
        let mut state = self.state.lock().unwrap();
        state.child_page_size = Some(size);
    }

    /// Ids passed to successful `delete_file` calls, in call order.
    pub fn deleted_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.deleted.clone()
    }

    pub fn was_deleted(&self, id: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.deleted.iter().any(|d| d == id)
    }

    /// Number of calls made to `op` (`"start_page_token"`, `"list_changes"`,
    /// `"get_file"`, `"list_trashed_children"`, `"delete_file"`).
    pub fn call_count(&self, op: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(op).copied().unwrap_or(0)
    }

    /// Position one past the last logged change.
    pub fn frontier(&self) -> Cursor {
        let state = self.state.lock().unwrap();
        Cursor::new(state.log.len() as u64 + 1)
    }

    fn enter(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, MockState>, ApiError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_insert(0) += 1;
        let injected = state.injected.pop_front();
        match injected {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl DriveApi for MockDrive {
    fn start_page_token(&self) -> Result<Cursor, ApiError> {
        let state = self.enter("start_page_token")?;
        Ok(Cursor::new(state.log.len() as u64 + 1))
    }

    fn list_changes(&self, query: &ChangesQuery) -> Result<ChangePage, ApiError> {
        let state = self.enter("list_changes")?;
        let frontier = state.log.len() as u64 + 1;
        let start = query.start.value().max(1);
        let end = (start + query.page_size as u64).min(frontier);

        let changes = (start..end)
            .filter_map(|pos| {
                let (id, time) = &state.log[(pos - 1) as usize];
                if state.deleted.contains(id) {
                    return None;
                }
                Some(ChangeRecord {
                    file_id: id.clone(),
                    time: time.clone(),
                    file: state.files.get(id).cloned(),
                })
            })
            .collect();

        let (next_page_token, new_start_page_token) = if end < frontier {
            (Some(Cursor::new(end)), None)
        } else {
            (None, Some(Cursor::new(frontier)))
        };
        Ok(ChangePage {
            next_page_token,
            new_start_page_token,
            changes,
        })
    }

    fn get_file(&self, file_id: &str) -> Result<FileMeta, ApiError> {
        let state = self.enter("get_file")?;
        state.files.get(file_id).cloned().ok_or_else(|| ApiError::Status {
            status: 404,
            message: format!("File not found: {}", file_id),
        })
    }

    fn list_trashed_children(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ChildPage, ApiError> {
        let state = self.enter("list_trashed_children")?;
        // Ordered by id so page tokens stay stable.
        let children: BTreeMap<&String, &FileMeta> = state
            .files
            .iter()
            .filter(|(id, meta)| {
                meta.explicitly_trashed
                    && meta.parents.first().map(String::as_str) == Some(parent_id)
                    && !state.deleted.contains(*id)
            })
            .collect();

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let limit = state
            .child_page_size
            .unwrap_or(page_size as usize)
            .min(page_size as usize)
            .max(1);
        let files: Vec<ChildEntry> = children
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, meta)| ChildEntry {
                id: (*id).clone(),
                name: meta.name.clone(),
            })
            .collect();
        let next_page_token =
            (offset + files.len() < children.len()).then(|| (offset + files.len()).to_string());
        Ok(ChildPage {
            files,
            next_page_token,
        })
    }

    fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let mut state = self.enter("delete_file")?;
        if state.fail_delete_ids.contains(file_id) {
            return Err(ApiError::Status {
                status: 403,
                message: format!("Insufficient permissions for file {}", file_id),
            });
        }
        state.deleted.push(file_id.to_string());
        Ok(())
    }
}
