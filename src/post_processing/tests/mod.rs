use super::*;
use crate::job::{JobOptions, Origin};
use crate::registry::TaskStatus;
use crate::types::{ChatId, JobId};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Records every stage it runs; can cancel the job inside one stage
#[derive(Default)]
struct RecordingProcessor {
    calls: Mutex<Vec<Stage>>,
    cancel_in: Option<Stage>,
    fail_in: Option<Stage>,
}

impl RecordingProcessor {
    fn cancelling_in(stage: Stage) -> Self {
        Self {
            cancel_in: Some(stage),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, ctx: StageContext<'_>, stage: Stage, path: PathBuf) -> crate::Result<StageOutcome> {
        self.calls.lock().unwrap().push(stage);
        if self.fail_in == Some(stage) {
            return Err(crate::error::PostProcessError::StageFailed {
                stage,
                path,
                reason: "tool exited with status 2".into(),
            }
            .into());
        }
        if self.cancel_in == Some(stage) {
            ctx.cancel.cancel();
            return Ok(StageOutcome::Cancelled);
        }
        Ok(StageOutcome::Completed(path))
    }
}

#[async_trait]
impl MediaProcessor for RecordingProcessor {
    async fn join_parts(&self, ctx: StageContext<'_>, dir: &Path) -> crate::Result<()> {
        self.record(ctx, Stage::Join, dir.to_path_buf()).map(|_| ())
    }

    async fn extract(&self, ctx: StageContext<'_>, path: &Path) -> crate::Result<StageOutcome> {
        self.record(ctx, Stage::Extract, path.to_path_buf())
    }

    async fn convert(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        _targets: ConvertTargets,
        exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        exclusions.unwanted_files.push(path.join("original.mkv"));
        exclusions.unwanted_sizes.push(5);
        self.record(ctx, Stage::Convert, path.to_path_buf())
    }

    async fn sample(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        self.record(ctx, Stage::Sample, path.to_path_buf())
    }

    async fn compress(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        let archive = path.with_extension("zip");
        std::fs::write(&archive, b"PK").unwrap();
        self.record(ctx, Stage::Compress, archive)
    }

    async fn split(
        &self,
        ctx: StageContext<'_>,
        dir: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        self.record(ctx, Stage::Split, dir.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn origin() -> Origin {
    Origin {
        chat_id: ChatId(1),
        message_link: "https://t.me/c/1/1".into(),
        tag: "@bob".into(),
        is_super_chat: false,
    }
}

/// Lay out `<root>/<id>/Show/{a,b}` and return a job pointing at it
fn job_with_tree(root: &TempDir, options: JobOptions) -> Job {
    let job = Job::new(JobId(1), origin(), root.path(), options).with_name("Show");
    std::fs::create_dir_all(job.up_path()).unwrap();
    std::fs::write(job.up_path().join("a.mkv"), vec![0u8; 100]).unwrap();
    std::fs::write(job.up_path().join("b.mkv"), vec![0u8; 50]).unwrap();
    job
}

async fn pipeline(processor: Arc<RecordingProcessor>) -> (PostProcessor, TaskRegistry) {
    let (tx, _rx) = broadcast::channel(100);
    let registry = TaskRegistry::new();
    registry
        .register(JobId(1), TaskStatus::acquiring("Show", "gid"))
        .await;
    (PostProcessor::new(processor, registry.clone(), tx), registry)
}

#[tokio::test]
async fn test_no_stages_requested() {
    let root = TempDir::new().unwrap();
    let mut job = job_with_tree(&root, JobOptions::default());
    let processor = Arc::new(RecordingProcessor::default());
    let (pipeline, _registry) = pipeline(processor.clone()).await;

    let mut exclusions = Exclusions::default();
    let outcome = pipeline.run(&mut job, &mut exclusions).await.unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Ready(UploadCandidate {
            path: root.path().join("1/Show"),
            dir: root.path().join("1"),
        })
    );
    assert!(processor.calls().is_empty());
    assert_eq!(job.size, 150);
}

#[tokio::test]
async fn test_stages_run_in_fixed_order() {
    let root = TempDir::new().unwrap();
    let options = JobOptions {
        is_leech: true,
        join: true,
        extract: true,
        convert_video: true,
        sample_video: true,
        ..Default::default()
    };
    let mut job = job_with_tree(&root, options);
    let processor = Arc::new(RecordingProcessor::default());
    let (pipeline, _registry) = pipeline(processor.clone()).await;

    let mut exclusions = Exclusions::default();
    let outcome = pipeline.run(&mut job, &mut exclusions).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Ready(_)));
    assert_eq!(
        processor.calls(),
        vec![
            Stage::Join,
            Stage::Extract,
            Stage::Convert,
            Stage::Sample,
            Stage::Split
        ]
    );
    assert_eq!(exclusions.excluded_bytes(), 5);
}

#[tokio::test]
async fn test_compress_skips_split_and_renames_candidate() {
    let root = TempDir::new().unwrap();
    let options = JobOptions {
        is_leech: true,
        compress: true,
        ..Default::default()
    };
    let mut job = job_with_tree(&root, options);
    let processor = Arc::new(RecordingProcessor::default());
    let (pipeline, registry) = pipeline(processor.clone()).await;

    let mut exclusions = Exclusions::default();
    let outcome = pipeline.run(&mut job, &mut exclusions).await.unwrap();

    assert_eq!(processor.calls(), vec![Stage::Compress]);
    assert_eq!(job.name, "Show.zip");
    match outcome {
        PipelineOutcome::Ready(candidate) => {
            assert_eq!(candidate.path, root.path().join("1/Show.zip"));
        }
        PipelineOutcome::Cancelled => panic!("pipeline should have finished"),
    }
    let status = registry.get(JobId(1)).await.unwrap();
    assert_eq!(status.name, "Show.zip");
    assert_eq!(
        status.state,
        TaskState::PostProcessing {
            stage: Stage::Compress
        }
    );
}

#[tokio::test]
async fn test_cancel_inside_compress_halts_pipeline() {
    let root = TempDir::new().unwrap();
    let options = JobOptions {
        is_leech: true,
        extract: true,
        compress: true,
        ..Default::default()
    };
    let mut job = job_with_tree(&root, options);
    let processor = Arc::new(RecordingProcessor::cancelling_in(Stage::Compress));
    let (pipeline, _registry) = pipeline(processor.clone()).await;

    let mut exclusions = Exclusions::default();
    let outcome = pipeline.run(&mut job, &mut exclusions).await.unwrap();

    assert_eq!(outcome, PipelineOutcome::Cancelled);
    assert_eq!(processor.calls(), vec![Stage::Extract, Stage::Compress]);
    assert!(job.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_before_first_stage() {
    let root = TempDir::new().unwrap();
    let options = JobOptions {
        extract: true,
        ..Default::default()
    };
    let mut job = job_with_tree(&root, options);
    job.cancel();
    let processor = Arc::new(RecordingProcessor::default());
    let (pipeline, _registry) = pipeline(processor.clone()).await;

    let outcome = pipeline
        .run(&mut job, &mut Exclusions::default())
        .await
        .unwrap();

    assert_eq!(outcome, PipelineOutcome::Cancelled);
    assert!(processor.calls().is_empty());
}

#[tokio::test]
async fn test_stage_failure_is_returned() {
    let root = TempDir::new().unwrap();
    let options = JobOptions {
        extract: true,
        sample_video: true,
        ..Default::default()
    };
    let mut job = job_with_tree(&root, options);
    let processor = Arc::new(RecordingProcessor {
        fail_in: Some(Stage::Extract),
        ..Default::default()
    });
    let (pipeline, _registry) = pipeline(processor.clone()).await;

    let err = pipeline
        .run(&mut job, &mut Exclusions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), crate::error::ErrorKind::PostProcessing);
    assert_eq!(processor.calls(), vec![Stage::Extract]);
}
