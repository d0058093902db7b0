//! Post-processing pipeline for completed acquisitions
//!
//! Stages run in a fixed order, each only when the job asked for it:
//! 1. Join - merge split parts back together (directories only)
//! 2. Extract - archive extraction
//! 3. Convert - audio/video conversion
//! 4. Sample - sample clip generation
//! 5. Compress - pack into an archive
//! 6. Split - leech delivery without compression splits oversized files
//!
//! The stages themselves are external tools behind [`MediaProcessor`]. The
//! pipeline owns the ordering, the cancellation checks between stages, and the
//! name/size bookkeeping after each one.

use crate::error::Result;
use crate::job::{Exclusions, Job};
use crate::registry::TaskRegistry;
use crate::types::{Event, Stage, TaskState};
use crate::utils::{get_path_size, split_path};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

mod noop;
mod traits;

pub use noop::NoOpMediaProcessor;
pub use traits::{ConvertTargets, MediaProcessor, StageContext, StageOutcome};

/// Where the upload candidate ended up after post-processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    /// Final path of the candidate
    pub path: PathBuf,
    /// Directory containing the candidate
    pub dir: PathBuf,
}

/// Result of running the pipeline for one job
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All requested stages ran; the candidate is ready for upload
    Ready(UploadCandidate),
    /// The job was cancelled at or inside a stage
    Cancelled,
}

/// Post-processing pipeline executor
pub struct PostProcessor {
    /// Stage implementations
    processor: Arc<dyn MediaProcessor>,
    /// Registry, for the per-stage visible state
    registry: TaskRegistry,
    /// Event channel for emitting pipeline events
    event_tx: broadcast::Sender<Event>,
}

impl PostProcessor {
    /// Create a new post-processing pipeline executor
    pub fn new(
        processor: Arc<dyn MediaProcessor>,
        registry: TaskRegistry,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            processor,
            registry,
            event_tx,
        }
    }

    /// Run every stage the job requested
    ///
    /// Updates `job.name` and `job.size` after each stage that can move the
    /// candidate. Stage failures are returned as errors; cancellation is a
    /// normal outcome and the caller decides how to tear the job down.
    pub async fn run(&self, job: &mut Job, exclusions: &mut Exclusions) -> Result<PipelineOutcome> {
        let options = job.options.clone();
        let cancel = job.cancel_token();
        let gid = job.gid.clone();
        let ctx = StageContext {
            id: job.id,
            gid: &gid,
            cancel: &cancel,
        };
        let mut up_path = job.up_path();

        info!(
            job_id = %job.id,
            processor = self.processor.name(),
            ?up_path,
            "starting post-processing"
        );

        let is_dir = tokio::fs::metadata(&up_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if options.join && is_dir {
            if !self.enter_stage(job, Stage::Join).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            self.processor.join_parts(ctx, &up_path).await?;
        }

        if options.extract {
            if !self.enter_stage(job, Stage::Extract).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            let outcome = self.processor.extract(ctx, &up_path).await?;
            let Some(path) = finished(job, outcome) else {
                return Ok(PipelineOutcome::Cancelled);
            };
            up_path = path;
            self.settle(job, &up_path).await;
        }

        if options.convert_audio || options.convert_video {
            if !self.enter_stage(job, Stage::Convert).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            let targets = ConvertTargets {
                audio: options.convert_audio,
                video: options.convert_video,
            };
            let outcome = self
                .processor
                .convert(ctx, &up_path, targets, exclusions)
                .await?;
            let Some(path) = finished(job, outcome) else {
                return Ok(PipelineOutcome::Cancelled);
            };
            up_path = path;
            self.settle(job, &up_path).await;
        }

        if options.sample_video {
            if !self.enter_stage(job, Stage::Sample).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            let outcome = self.processor.sample(ctx, &up_path, exclusions).await?;
            let Some(path) = finished(job, outcome) else {
                return Ok(PipelineOutcome::Cancelled);
            };
            up_path = path;
            self.settle(job, &up_path).await;
        }

        if options.compress {
            if !self.enter_stage(job, Stage::Compress).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            let outcome = self.processor.compress(ctx, &up_path, exclusions).await?;
            let Some(path) = finished(job, outcome) else {
                return Ok(PipelineOutcome::Cancelled);
            };
            up_path = path;
        }

        let up_dir = self.settle(job, &up_path).await;

        if options.is_leech && !options.compress {
            if !self.enter_stage(job, Stage::Split).await {
                return Ok(PipelineOutcome::Cancelled);
            }
            let outcome = self.processor.split(ctx, &up_dir, exclusions).await?;
            if finished(job, outcome).is_none() {
                return Ok(PipelineOutcome::Cancelled);
            }
        }

        debug!(job_id = %job.id, name = %job.name, size = job.size, "post-processing complete");

        Ok(PipelineOutcome::Ready(UploadCandidate {
            path: up_path,
            dir: up_dir,
        }))
    }

    /// Publish the stage as started; `false` if the job was cancelled first
    async fn enter_stage(&self, job: &Job, stage: Stage) -> bool {
        if job.is_cancelled() {
            debug!(job_id = %job.id, %stage, "cancelled before stage");
            return false;
        }
        info!(job_id = %job.id, %stage, name = %job.name, "running stage");
        self.registry
            .set_state(job.id, TaskState::PostProcessing { stage })
            .await;
        self.event_tx
            .send(Event::StageStarted { id: job.id, stage })
            .ok();
        true
    }

    /// Adopt the candidate's name and recompute the size of its directory
    async fn settle(&self, job: &mut Job, up_path: &std::path::Path) -> PathBuf {
        let (up_dir, name) = split_path(up_path);
        job.name = name;
        job.size = get_path_size(&up_dir).await;
        self.registry.set_progress(job.id, &job.name, job.size).await;
        up_dir
    }
}

/// New path from a stage, or `None` if the stage or anyone else cancelled the job
fn finished(job: &Job, outcome: StageOutcome) -> Option<PathBuf> {
    match outcome {
        StageOutcome::Completed(path) if !job.is_cancelled() => Some(path),
        StageOutcome::Completed(_) | StageOutcome::Cancelled => {
            debug!(job_id = %job.id, "stage reported cancellation");
            None
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
