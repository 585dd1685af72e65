//! Full display paths for trashed files.
//!
//! Paths are built by walking the first parent of each file up to a root and are
//! memoized per id. Resolving the same id a second time also pre-caches all of its
//! trashed children with one bulk listing, so many trashed siblings under one folder
//! cost a handful of list calls instead of one parent walk each.

use crate::drive::{DriveApi, FileMeta};
use crate::error::Error;
use crate::executor::RequestExecutor;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::trace;

/// Page size for trashed-children listings.
pub const EXPAND_PAGE_SIZE: u32 = 1000;

const SEPARATOR: char = '/';

#[derive(Debug)]
struct CacheEntry {
    path: String,
    /// Resolutions served for this id so far. Entries filled by expansion start at 0.
    hits: u32,
}

pub struct PathResolver<'a, D: DriveApi + ?Sized> {
    drive: &'a D,
    executor: &'a RequestExecutor,
    timeout: Duration,
    cache: HashMap<String, CacheEntry>,
    expanded: HashSet<String>,
}

impl<'a, D: DriveApi + ?Sized> PathResolver<'a, D> {
    pub fn new(drive: &'a D, executor: &'a RequestExecutor, timeout: Duration) -> Self {
        Self {
            drive,
            executor,
            timeout,
            cache: HashMap::new(),
            expanded: HashSet::new(),
        }
    }

    /// Full path of `file_id`. `known` is the file's own metadata when the caller already
    /// has it, which saves the lookup for that id.
    pub fn resolve(&mut self, file_id: &str, known: Option<&FileMeta>) -> Result<String, Error> {
        if let Some(hits) = self.cache.get(file_id).map(|e| e.hits) {
            if hits > 0 {
                self.expand(file_id)?;
            }
            if let Some(entry) = self.cache.get_mut(file_id) {
                entry.hits += 1;
                return Ok(entry.path.clone());
            }
        }

        let fetched;
        let meta = match known {
            Some(meta) => meta,
            None => {
                trace!(file_id, "Looking up parent chain");
                fetched = self
                    .executor
                    .execute(self.timeout, || self.drive.get_file(file_id))?;
                &fetched
            }
        };

        let path = match meta.parents.first() {
            Some(parent) => format!("{}{}{}", self.resolve(parent, None)?, SEPARATOR, meta.name),
            None => meta.name.clone(),
        };
        self.cache.insert(
            file_id.to_string(),
            CacheEntry {
                path: path.clone(),
                hits: 1,
            },
        );
        Ok(path)
    }

    /// Cache every trashed child of an already cached id. Runs at most once per id.
    fn expand(&mut self, file_id: &str) -> Result<(), Error> {
        if self.expanded.contains(file_id) {
            return Ok(());
        }
        let parent_path = match self.cache.get(file_id) {
            Some(entry) => entry.path.clone(),
            None => return Ok(()),
        };

        let mut page_token: Option<String> = None;
        let mut added = 0usize;
        loop {
            let page = self.executor.execute(self.timeout, || {
                self.drive
                    .list_trashed_children(file_id, page_token.as_deref(), EXPAND_PAGE_SIZE)
            })?;
            for child in page.files {
                if self.cache.contains_key(&child.id) {
                    continue;
                }
                let path = format!("{}{}{}", parent_path, SEPARATOR, child.name);
                self.cache.insert(child.id, CacheEntry { path, hits: 0 });
                added += 1;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        trace!(file_id, added, "Expanded trashed children");
        self.expanded.insert(file_id.to_string());
        Ok(())
    }
}
