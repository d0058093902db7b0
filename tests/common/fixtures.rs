//! Fake collaborators built only from the public API

use async_trait::async_trait;
use mirror_dl::post_processing::{ConvertTargets, StageContext};
use mirror_dl::{
    AcquisitionEngine, ChatId, Collaborators, Config, Exclusions, Job, JobId, JobOptions,
    LinkButton, MediaProcessor, Notifier, Origin, Result, SinkSet, Stage, StageOutcome,
    StatusBroadcaster, TaskController, TransferSink, UploadOutcome, UploadRequest,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Keeps every published message
#[derive(Default)]
pub struct CollectingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn publish(&self, _chat_id: ChatId, message: &str, _buttons: Option<&[LinkButton]>) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Counts status refreshes and clears
#[derive(Default)]
pub struct CountingBroadcaster {
    pub refreshes: AtomicUsize,
    pub clears: AtomicUsize,
}

#[async_trait]
impl StatusBroadcaster for CountingBroadcaster {
    async fn refresh(&self, _chat_id: ChatId) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine that only counts purges
#[derive(Default)]
pub struct IdleEngine {
    pub purges: AtomicUsize,
}

#[async_trait]
impl AcquisitionEngine for IdleEngine {
    async fn purge(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One upload as the sink saw it
#[derive(Clone, Debug)]
pub struct Delivery {
    pub id: JobId,
    pub files: Vec<String>,
}

/// Cloud sink that records uploads, tracks concurrency, and can hold uploads open
#[derive(Default)]
pub struct TrackingSink {
    pub deliveries: Mutex<Vec<Delivery>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl TrackingSink {
    /// Uploads block until a permit is added to the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        (sink, gate)
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

fn relative_files(root: &Path) -> Vec<String> {
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
impl TransferSink for TrackingSink {
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.deliveries.lock().unwrap().push(Delivery {
            id: request.id,
            files: relative_files(&request.path),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(UploadOutcome::Cloud {
            link: Some(format!("https://cloud.example/{}", request.id)),
            files: 1,
            folders: 0,
            mime_type: "application/octet-stream".into(),
            remote_path: None,
            dir_id: None,
        })
    }

    fn name(&self) -> &str {
        "tracking"
    }
}

/// Media stages that pass through, except compress which gets cancelled mid-run
#[derive(Default)]
pub struct CancellingCompressor {
    pub calls: Mutex<Vec<Stage>>,
}

impl CancellingCompressor {
    fn record(&self, stage: Stage, path: &Path) -> Result<StageOutcome> {
        self.calls.lock().unwrap().push(stage);
        Ok(StageOutcome::Completed(path.to_path_buf()))
    }
}

#[async_trait]
impl MediaProcessor for CancellingCompressor {
    async fn join_parts(&self, _ctx: StageContext<'_>, dir: &Path) -> Result<()> {
        self.record(Stage::Join, dir).map(|_| ())
    }

    async fn extract(&self, _ctx: StageContext<'_>, path: &Path) -> Result<StageOutcome> {
        self.record(Stage::Extract, path)
    }

    async fn convert(
        &self,
        _ctx: StageContext<'_>,
        path: &Path,
        _targets: ConvertTargets,
        _exclusions: &mut Exclusions,
    ) -> Result<StageOutcome> {
        self.record(Stage::Convert, path)
    }

    async fn sample(&self, _ctx: StageContext<'_>, path: &Path, _exclusions: &mut Exclusions) -> Result<StageOutcome> {
        self.record(Stage::Sample, path)
    }

    async fn compress(&self, ctx: StageContext<'_>, path: &Path, _exclusions: &mut Exclusions) -> Result<StageOutcome> {
        self.calls.lock().unwrap().push(Stage::Compress);
        tokio::fs::write(path.with_extension("7z"), b"7z").await?;
        ctx.cancel.cancel();
        Ok(StageOutcome::Cancelled)
    }

    async fn split(&self, _ctx: StageContext<'_>, dir: &Path, _exclusions: &mut Exclusions) -> Result<StageOutcome> {
        self.record(Stage::Split, dir)
    }

    fn name(&self) -> &'static str {
        "cancelling-compressor"
    }
}

/// A controller plus handles to its fakes
pub struct Harness {
    pub controller: TaskController,
    pub notifier: Arc<CollectingNotifier>,
    pub broadcaster: Arc<CountingBroadcaster>,
    pub engine: Arc<IdleEngine>,
    pub sink: Arc<TrackingSink>,
    pub temp_dir: TempDir,
}

impl Harness {
    /// Build a controller; `sink` serves every sink kind
    pub async fn new(
        configure: impl FnOnce(&mut Config),
        sink: TrackingSink,
        media: Option<Arc<dyn MediaProcessor>>,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = super::config::scenario_config(temp_dir.path());
        configure(&mut config);

        let notifier = Arc::new(CollectingNotifier::default());
        let broadcaster = Arc::new(CountingBroadcaster::default());
        let engine = Arc::new(IdleEngine::default());
        let sink = Arc::new(sink);
        let shared: Arc<dyn TransferSink> = sink.clone();

        let mut collaborators =
            Collaborators::new(notifier.clone(), broadcaster.clone(), engine.clone()).with_sinks(SinkSet {
                leech: Some(shared.clone()),
                drive: Some(shared.clone()),
                rclone: Some(shared),
            });
        if let Some(media) = media {
            collaborators = collaborators.with_media(media);
        }

        let controller = TaskController::new(config, collaborators).await.unwrap();
        Self {
            controller,
            notifier,
            broadcaster,
            engine,
            sink,
            temp_dir,
        }
    }

    /// A group-chat job uploading to an rclone remote
    pub fn job(&self, id: i64, options: JobOptions) -> Job {
        let origin = Origin {
            chat_id: ChatId(-1001),
            message_link: format!("https://t.me/c/1001/{id}"),
            tag: "@scenario".to_string(),
            is_super_chat: true,
        };
        let options = JobOptions {
            up_dest: "remote:mirror".to_string(),
            ..options
        };
        Job::new(JobId(id), origin, self.controller.get_config().download_dir(), options)
    }
}

/// Write `files` under `<job.dir>/<name>`, each containing its own path
pub fn write_files(job: &Job, name: &str, files: &[&str]) {
    for file in files {
        let path = job.dir.join(name).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, file.as_bytes()).unwrap();
    }
}

