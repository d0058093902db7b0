//! Same-directory coalescing for multi-item submissions
//!
//! Jobs submitted together share a [`SameDirGroup`]. Each sibling calls
//! [`SameDirGroup::arrive`] when its acquisition finishes. The arrival
//! decrements the pending count and compares it under the group lock, so exactly
//! one sibling (the last to arrive) sees [`Arrival::Last`]. That sibling merges the
//! trees of every earlier arrival into its own directory and is the only one that
//! goes on to upload. Earlier arrivals get [`Arrival::Deferred`] and stop.

use crate::error::{Error, PostProcessError, Result};
use crate::types::JobId;
use crate::utils::{clean_download, is_partial_marker};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A sibling that finished acquiring and is waiting to be merged
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrivedSibling {
    /// Sibling job id
    pub id: JobId,
    /// Sibling acquisition directory
    pub dir: PathBuf,
}

/// What an arriving sibling should do next
#[derive(Debug, PartialEq, Eq)]
pub enum Arrival {
    /// Not coalesced (single-member group, or no longer a member)
    Independent,
    /// Other siblings are still acquiring; leave the files for the last one
    Deferred,
    /// Last sibling standing: merge these siblings, then upload
    Last {
        /// Earlier arrivals whose trees must be merged
        siblings: Vec<ArrivedSibling>,
    },
}

#[derive(Debug)]
struct GroupState {
    pending: BTreeSet<JobId>,
    arrived: Vec<ArrivedSibling>,
}

/// Shared state of jobs landing in one destination folder
#[derive(Debug)]
pub struct SameDirGroup {
    name: String,
    size: usize,
    state: Mutex<GroupState>,
}

impl SameDirGroup {
    /// Create a group for `ids`, all writing into a folder called `name`
    pub fn new(name: impl Into<String>, ids: impl IntoIterator<Item = JobId>) -> Arc<Self> {
        let pending: BTreeSet<JobId> = ids.into_iter().collect();
        Arc::new(Self {
            name: name.into(),
            size: pending.len(),
            state: Mutex::new(GroupState {
                pending,
                arrived: Vec::new(),
            }),
        })
    }

    /// Folder name shared by all siblings
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of siblings the group was created with
    pub fn size(&self) -> usize {
        self.size
    }

    /// Siblings that have neither arrived nor detached
    pub async fn remaining(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Register that sibling `id` finished acquiring into `dir`
    pub async fn arrive(&self, id: JobId, dir: PathBuf) -> Arrival {
        let mut state = self.state.lock().await;

        if self.size <= 1 || !state.pending.remove(&id) {
            return Arrival::Independent;
        }

        if state.pending.is_empty() {
            let siblings = std::mem::take(&mut state.arrived);
            tracing::debug!(job_id = %id, group = %self.name, merged = siblings.len(), "last sibling arrived");
            Arrival::Last { siblings }
        } else {
            tracing::debug!(job_id = %id, group = %self.name, remaining = state.pending.len(), "sibling deferred");
            state.arrived.push(ArrivedSibling { id, dir });
            Arrival::Deferred
        }
    }

    /// Remove a failed sibling from the group
    ///
    /// If it was the last pending sibling, nobody is left to upload the earlier
    /// arrivals; their directories are returned so the caller can purge them.
    pub async fn detach(&self, id: JobId) -> Vec<ArrivedSibling> {
        let mut state = self.state.lock().await;
        if state.pending.remove(&id) && state.pending.is_empty() {
            std::mem::take(&mut state.arrived)
        } else {
            Vec::new()
        }
    }

    /// Move every sibling's `<dir>/<name>` tree into `survivor_dir/<name>`
    ///
    /// Emptied sibling directories are purged afterwards. Returns the number of
    /// files moved.
    pub async fn merge_into(&self, survivor_dir: &Path, siblings: &[ArrivedSibling]) -> Result<usize> {
        let dest = survivor_dir.join(&self.name);
        let mut moved = 0;
        for sibling in siblings {
            let source = sibling.dir.join(&self.name);
            moved += merge_tree(&source, &dest, sibling.id).await?;
            clean_download(&sibling.dir).await;
        }
        Ok(moved)
    }
}

/// Recursively move every regular file under `source` into `dest`
///
/// Partial-file markers are skipped. A file whose name already exists at the
/// destination is renamed to `<source_id>-<name>`.
pub async fn merge_tree(source: &Path, dest: &Path, source_id: JobId) -> Result<usize> {
    let mut moved = 0;
    let mut stack = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((src_dir, dst_dir)) = stack.pop() {
        tokio::fs::create_dir_all(&dst_dir).await?;
        let mut entries = match tokio::fs::read_dir(&src_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            if entry.file_type().await?.is_dir() {
                stack.push((entry.path(), dst_dir.join(&file_name)));
                continue;
            }
            if is_partial_marker(&name) {
                continue;
            }

            let mut target = dst_dir.join(&file_name);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                target = dst_dir.join(format!("{source_id}-{name}"));
            }
            tokio::fs::rename(entry.path(), &target).await.map_err(|e| {
                Error::PostProcess(PostProcessError::MoveFailed {
                    source_path: entry.path(),
                    dest_path: target.clone(),
                    reason: e.to_string(),
                })
            })?;
            moved += 1;
        }
    }

    Ok(moved)
}
