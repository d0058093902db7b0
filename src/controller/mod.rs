//! Job lifecycle controller split into focused submodules.
//!
//! The `TaskController` struct and its methods are organized by lifecycle step:
//! - [`download`] - Registration and download admission
//! - [`download_complete`] - Coalescing, post-processing, upload admission, sink dispatch
//! - [`upload_complete`] - Result summary, seeding, final cleanup
//! - [`failure`] - Download/upload error paths and quiescing
//! - [`summary`] - Result message rendering

mod download;
mod download_complete;
mod failure;
mod summary;
mod upload_complete;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use summary::{CloudResult, cloud_summary, leech_pages};

use crate::admission::{AdmissionController, QueueLimits};
use crate::config::Config;
use crate::db::{Database, IncompleteTaskStore};
use crate::error::{Error, Result};
use crate::job::Job;
use crate::notify::{AcquisitionEngine, LinkButton, Notifier, StatusBroadcaster, StatusIntervals};
use crate::post_processing::{MediaProcessor, NoOpMediaProcessor, PostProcessor};
use crate::registry::TaskRegistry;
use crate::sink::SinkSet;
use crate::types::{ChatId, Event};
use std::sync::Arc;

/// External collaborators the controller drives
///
/// Only the notifier, status broadcaster, and acquisition engine are required;
/// everything else has a usable default.
#[derive(Clone)]
pub struct Collaborators {
    /// Sink adapters
    pub sinks: SinkSet,
    /// Chat message delivery
    pub notifier: Arc<dyn Notifier>,
    /// Status message maintenance
    pub broadcaster: Arc<dyn StatusBroadcaster>,
    /// Acquisition engine
    pub engine: Arc<dyn AcquisitionEngine>,
    /// Media-processing stages (defaults to [`NoOpMediaProcessor`])
    pub media: Arc<dyn MediaProcessor>,
    /// Incomplete-task store; when unset, one is opened from the configured database path
    pub store: Option<Arc<dyn IncompleteTaskStore>>,
}

impl Collaborators {
    /// Required collaborators; no sinks, pass-through media stages
    pub fn new(
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn StatusBroadcaster>,
        engine: Arc<dyn AcquisitionEngine>,
    ) -> Self {
        Self {
            sinks: SinkSet::default(),
            notifier,
            broadcaster,
            engine,
            media: Arc::new(NoOpMediaProcessor),
            store: None,
        }
    }

    /// Use these sink adapters
    pub fn with_sinks(mut self, sinks: SinkSet) -> Self {
        self.sinks = sinks;
        self
    }

    /// Use this media processor
    pub fn with_media(mut self, media: Arc<dyn MediaProcessor>) -> Self {
        self.media = media;
        self
    }

    /// Use this incomplete-task store instead of opening the database
    pub fn with_store(mut self, store: Arc<dyn IncompleteTaskStore>) -> Self {
        self.store = Some(store);
        self
    }
}

/// Main lifecycle controller (cloneable - all fields are Arc-wrapped)
///
/// One controller serves every job. Each job is driven by its own execution
/// context calling, in order, [`admit_download`](Self::admit_download),
/// [`on_download_start`](Self::on_download_start) and
/// [`on_download_complete`](Self::on_download_complete), or one of the error
/// handlers.
#[derive(Clone)]
pub struct TaskController {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Live jobs
    pub(crate) registry: TaskRegistry,
    /// Per-phase admission
    pub(crate) admission: AdmissionController,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Sink adapters
    pub(crate) sinks: SinkSet,
    /// Chat message delivery
    pub(crate) notifier: Arc<dyn Notifier>,
    /// Status message maintenance
    pub(crate) broadcaster: Arc<dyn StatusBroadcaster>,
    /// Acquisition engine
    pub(crate) engine: Arc<dyn AcquisitionEngine>,
    /// Post-processing pipeline executor
    pub(crate) post_processor: Arc<PostProcessor>,
    /// Incomplete-task store, present only when persistence is enabled
    pub(crate) store: Option<Arc<dyn IncompleteTaskStore>>,
    /// Periodic status refresh timers
    pub(crate) intervals: StatusIntervals,
}

impl TaskController {
    /// Create a new TaskController instance
    ///
    /// Validates the configuration, creates the download directory and, when
    /// incomplete-task persistence is enabled without an injected store, opens
    /// the SQLite database.
    pub async fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir().display(),
                        e
                    ),
                ))
            })?;

        let Collaborators {
            sinks,
            notifier,
            broadcaster,
            engine,
            media,
            store,
        } = collaborators;

        let store = match (store, &config.persistence.database_path) {
            (Some(store), _) if config.persistence.incomplete_task_notifier => Some(store),
            (None, Some(path)) if config.persistence.enabled() => {
                let db: Arc<dyn IncompleteTaskStore> = Arc::new(Database::new(path).await?);
                Some(db)
            }
            _ => None,
        };

        // Buffer of 1000 events; slow subscribers get `RecvError::Lagged`
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let registry = TaskRegistry::new();
        let admission = AdmissionController::new(QueueLimits::from(&config.queue), event_tx.clone());
        let post_processor = Arc::new(PostProcessor::new(media, registry.clone(), event_tx.clone()));

        tracing::info!(
            queue_all = config.queue.queue_all,
            queue_download = config.queue.queue_download,
            queue_upload = config.queue.queue_upload,
            persistence = store.is_some(),
            "task controller ready"
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            admission,
            event_tx,
            sinks,
            notifier,
            broadcaster,
            engine,
            post_processor,
            store,
            intervals: StatusIntervals::new(),
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Live job registry
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Admission sets and waiting-lists
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Re-render a chat's status message; failures are logged and dropped
    pub(crate) async fn refresh_status(&self, chat_id: ChatId) {
        if let Err(e) = self.broadcaster.refresh(chat_id).await {
            tracing::warn!(%chat_id, error = %e, "status refresh failed");
        }
    }

    /// Quiesce when nothing is left, otherwise refresh the job's chat
    pub(crate) async fn refresh_or_quiesce(&self, remaining: usize, chat_id: ChatId) {
        if remaining == 0 {
            self.quiesce().await;
        } else {
            self.refresh_status(chat_id).await;
        }
    }

    /// Publish a message; delivery failures are logged and dropped
    pub(crate) async fn publish(&self, chat_id: ChatId, message: &str, buttons: Option<&[LinkButton]>) {
        if let Err(e) = self.notifier.publish(chat_id, message, buttons).await {
            tracing::warn!(%chat_id, error = %e, "failed to publish message");
        }
    }

    /// Store to use for this job, if persistence applies to it
    fn store_for(&self, job: &Job) -> Option<&Arc<dyn IncompleteTaskStore>> {
        if job.origin.is_super_chat {
            self.store.as_ref()
        } else {
            None
        }
    }

    pub(crate) async fn record_incomplete(&self, job: &Job) {
        let Some(store) = self.store_for(job) else {
            return;
        };
        let origin = &job.origin;
        if let Err(e) = store
            .add_incomplete_task(origin.chat_id, &origin.message_link, &origin.tag)
            .await
        {
            tracing::warn!(job_id = %job.id, error = %e, "failed to record incomplete task");
        }
    }

    pub(crate) async fn clear_incomplete(&self, job: &Job) {
        let Some(store) = self.store_for(job) else {
            return;
        };
        if let Err(e) = store.rm_complete_task(&job.origin.message_link).await {
            tracing::warn!(job_id = %job.id, error = %e, "failed to clear incomplete task");
        }
    }
}
