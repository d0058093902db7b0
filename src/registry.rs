//! Registry of live jobs and their visible status
//!
//! The registry is the single source of truth for whether a job is still
//! active. Every operation takes the registry lock once, so callers never see
//! a half-applied transition.

use crate::types::{JobId, SinkKind, TaskState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Visible status of one registered job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskStatus {
    /// Display name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Engine-side identifier
    pub gid: String,
    /// Current lifecycle state
    pub state: TaskState,
}

impl TaskStatus {
    /// Status for a job the acquisition engine is working on
    pub fn acquiring(name: impl Into<String>, gid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            gid: gid.into(),
            state: TaskState::Acquiring,
        }
    }

    /// Status for a job handed to a sink
    pub fn uploading(name: impl Into<String>, size: u64, gid: impl Into<String>, sink: SinkKind) -> Self {
        Self {
            name: name.into(),
            size,
            gid: gid.into(),
            state: TaskState::Uploading { sink },
        }
    }
}

/// Mutex-guarded map of job id to status
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<JobId, TaskStatus>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any previous entry; returns the new task count
    pub async fn register(&self, id: JobId, status: TaskStatus) -> usize {
        let mut tasks = self.tasks.lock().await;
        tasks.insert(id, status);
        tasks.len()
    }

    /// Swap the status object of a job that is still registered
    ///
    /// Returns `false` without inserting when the job has already been removed,
    /// so a late transition can never resurrect a cancelled job.
    pub async fn replace(&self, id: JobId, status: TaskStatus) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&id) {
            Some(slot) => {
                *slot = status;
                true
            }
            None => false,
        }
    }

    /// Update only the lifecycle state of a registered job
    pub async fn set_state(&self, id: JobId, state: TaskState) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&id) {
            Some(status) => {
                status.state = state;
                true
            }
            None => false,
        }
    }

    /// Update name and size of a registered job
    pub async fn set_progress(&self, id: JobId, name: &str, size: u64) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&id) {
            Some(status) => {
                name.clone_into(&mut status.name);
                status.size = size;
                true
            }
            None => false,
        }
    }

    /// Deregister a job; returns the number of tasks left
    ///
    /// Removing an id that is not present is a no-op.
    pub async fn remove(&self, id: JobId) -> usize {
        let mut tasks = self.tasks.lock().await;
        tasks.remove(&id);
        tasks.len()
    }

    /// Current status of a job
    pub async fn get(&self, id: JobId) -> Option<TaskStatus> {
        self.tasks.lock().await.get(&id).cloned()
    }

    /// Whether a job is still registered
    pub async fn contains(&self, id: JobId) -> bool {
        self.tasks.lock().await.contains_key(&id)
    }

    /// Number of registered jobs
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether no jobs are registered
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Copy of all entries, ordered by job id
    pub async fn snapshot(&self) -> Vec<(JobId, TaskStatus)> {
        let tasks = self.tasks.lock().await;
        let mut entries: Vec<_> = tasks.iter().map(|(id, s)| (*id, s.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}
