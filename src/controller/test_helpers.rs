//! Shared test helpers for creating TaskController instances with recording fakes.

use crate::config::Config;
use crate::controller::{Collaborators, TaskController};
use crate::db::IncompleteTaskStore;
use crate::error::{Result, UploadError};
use crate::job::{Job, JobOptions, Origin};
use crate::notify::{AcquisitionEngine, LinkButton, Notifier, StatusBroadcaster};
use crate::post_processing::{MediaProcessor, NoOpMediaProcessor};
use crate::sink::{SinkSet, TransferSink, UploadOutcome, UploadRequest};
use crate::types::{ChatId, JobId, SinkKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Semaphore;

/// Notifier that keeps every published message
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) messages: Mutex<Vec<(ChatId, String, Vec<LinkButton>)>>,
}

impl RecordingNotifier {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, chat_id: ChatId, message: &str, buttons: Option<&[LinkButton]>) -> Result<()> {
        self.messages.lock().unwrap().push((
            chat_id,
            message.to_string(),
            buttons.map(<[LinkButton]>::to_vec).unwrap_or_default(),
        ));
        Ok(())
    }
}

/// Broadcaster that counts refreshes and clears
#[derive(Default)]
pub(crate) struct RecordingBroadcaster {
    pub(crate) refreshes: AtomicUsize,
    pub(crate) clears: AtomicUsize,
}

#[async_trait]
impl StatusBroadcaster for RecordingBroadcaster {
    async fn refresh(&self, _chat_id: ChatId) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine whose purge always fails, to prove quiesce swallows it
#[derive(Default)]
pub(crate) struct RecordingEngine {
    pub(crate) purges: AtomicUsize,
}

#[async_trait]
impl AcquisitionEngine for RecordingEngine {
    async fn purge(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Err(crate::Error::Other("engine offline".into()))
    }
}

/// What a [`RecordingSink`] saw for one upload
#[derive(Debug, Clone)]
pub(crate) struct SeenUpload {
    pub(crate) id: JobId,
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
    /// Relative paths of every file under `path` at upload time
    pub(crate) files: Vec<String>,
}

/// Sink that records uploads and can hold them until released
pub(crate) struct RecordingSink {
    kind: SinkKind,
    pub(crate) uploads: Mutex<Vec<SeenUpload>>,
    /// When set, each upload takes a permit before returning
    gate: Option<Arc<Semaphore>>,
    fail_with: Option<String>,
}

impl RecordingSink {
    pub(crate) fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            uploads: Mutex::new(Vec::new()),
            gate: None,
            fail_with: None,
        }
    }

    /// Uploads block until a permit is added to the returned semaphore
    pub(crate) fn gated(kind: SinkKind) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            gate: Some(gate.clone()),
            ..Self::new(kind)
        };
        (sink, gate)
    }

    pub(crate) fn failing(kind: SinkKind, reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::new(kind)
        }
    }

    pub(crate) fn seen(&self) -> Vec<SeenUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();
    files.sort();
    files
}

#[async_trait]
impl TransferSink for RecordingSink {
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        self.uploads.lock().unwrap().push(SeenUpload {
            id: request.id,
            path: request.path.clone(),
            size: request.size,
            files: list_files(&request.path),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(reason) = &self.fail_with {
            return Err(UploadError::Failed {
                sink: self.kind,
                reason: reason.clone(),
            }
            .into());
        }

        Ok(match self.kind {
            SinkKind::Leech => UploadOutcome::Leech {
                files: Vec::new(),
                total_files: 1,
                corrupted: 0,
            },
            SinkKind::Drive | SinkKind::Rclone => UploadOutcome::Cloud {
                link: Some(format!("https://cloud.example/{}", request.id)),
                files: 1,
                folders: 0,
                mime_type: "application/octet-stream".into(),
                remote_path: None,
                dir_id: None,
            },
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Store that keeps the links it was given
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub(crate) added: Mutex<Vec<String>>,
    pub(crate) removed: Mutex<Vec<String>>,
}

#[async_trait]
impl IncompleteTaskStore for RecordingStore {
    async fn add_incomplete_task(&self, _chat_id: ChatId, link: &str, _tag: &str) -> Result<()> {
        self.added.lock().unwrap().push(link.to_string());
        Ok(())
    }

    async fn rm_complete_task(&self, link: &str) -> Result<()> {
        self.removed.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

/// Handles to every fake behind a test controller
pub(crate) struct Fakes {
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) broadcaster: Arc<RecordingBroadcaster>,
    pub(crate) engine: Arc<RecordingEngine>,
    pub(crate) store: Arc<RecordingStore>,
}

/// Config with short delays rooted in `root`
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.error_cleanup_delay = Duration::from_millis(10);
    config.download.message_page_delay = Duration::from_millis(1);
    config.download.status_update_interval = Duration::from_secs(3600);
    config.persistence.incomplete_task_notifier = true;
    config
}

/// Build a controller around `sink` (registered for every sink kind)
///
/// Returns the controller, the fakes, and the tempdir (which must be kept alive).
pub(crate) async fn create_test_controller(
    configure: impl FnOnce(&mut Config),
    sink: Arc<RecordingSink>,
) -> (TaskController, Fakes, tempfile::TempDir) {
    create_test_controller_with_media(configure, sink, Arc::new(NoOpMediaProcessor)).await
}

/// Like [`create_test_controller`], with custom media-processing stages
pub(crate) async fn create_test_controller_with_media(
    configure: impl FnOnce(&mut Config),
    sink: Arc<RecordingSink>,
    media: Arc<dyn MediaProcessor>,
) -> (TaskController, Fakes, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let fakes = Fakes {
        notifier: Arc::new(RecordingNotifier::default()),
        broadcaster: Arc::new(RecordingBroadcaster::default()),
        engine: Arc::new(RecordingEngine::default()),
        store: Arc::new(RecordingStore::default()),
    };

    let sink: Arc<dyn TransferSink> = sink;
    let collaborators = Collaborators::new(
        fakes.notifier.clone(),
        fakes.broadcaster.clone(),
        fakes.engine.clone(),
    )
    .with_sinks(SinkSet {
        leech: Some(sink.clone()),
        drive: Some(sink.clone()),
        rclone: Some(sink),
    })
    .with_media(media)
    .with_store(fakes.store.clone());

    let controller = TaskController::new(config, collaborators).await.unwrap();
    (controller, fakes, temp_dir)
}

/// A job from a group chat, uploading to rclone
pub(crate) fn test_job(controller: &TaskController, id: i64, options: JobOptions) -> Job {
    let origin = Origin {
        chat_id: ChatId(-100),
        message_link: format!("https://t.me/c/100/{id}"),
        tag: "@tester".to_string(),
        is_super_chat: true,
    };
    let options = JobOptions {
        up_dest: if options.up_dest.is_empty() {
            "remote:uploads".to_string()
        } else {
            options.up_dest
        },
        ..options
    };
    Job::new(JobId(id), origin, controller.config.download_dir(), options)
}

/// Write `files` (relative paths) under the job's `<dir>/<name>`
pub(crate) fn populate(job: &Job, name: &str, files: &[&str]) {
    for file in files {
        let path = job.dir.join(name).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, file.as_bytes()).unwrap();
    }
}
