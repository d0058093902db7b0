//! Traits and types for media-processing stages

use crate::job::Exclusions;
use crate::types::JobId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Result of one media-processing stage
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage finished; the upload candidate now lives at this path
    Completed(PathBuf),
    /// Stage observed cancellation and stopped
    Cancelled,
}

/// What a stage needs to know about the job it runs for
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Job being processed
    pub id: JobId,
    /// Engine-side identifier shown in stage status
    pub gid: &'a str,
    /// Job cancellation token; long-running stages should poll it
    pub cancel: &'a CancellationToken,
}

/// Which streams the convert stage should touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertTargets {
    /// Convert audio streams
    pub audio: bool,
    /// Convert video streams
    pub video: bool,
}

/// Trait for the opaque media-processing stages
///
/// Extraction, transcoding, sampling, compression and splitting are provided by
/// external tools. Implementations either hand back the new upload candidate or
/// report that they stopped because the job was cancelled. Stages that leave
/// helper files behind record them in `exclusions` so the sink skips them.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Merge split parts (`.001`, `.002`, ...) inside `dir` in place
    async fn join_parts(&self, ctx: StageContext<'_>, dir: &Path) -> crate::Result<()>;

    /// Extract archives found at `path`
    async fn extract(&self, ctx: StageContext<'_>, path: &Path) -> crate::Result<StageOutcome>;

    /// Convert audio and/or video streams
    async fn convert(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        targets: ConvertTargets,
        exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome>;

    /// Generate a sample clip next to each video
    async fn sample(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome>;

    /// Pack `path` into an archive
    async fn compress(
        &self,
        ctx: StageContext<'_>,
        path: &Path,
        exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome>;

    /// Split files in `dir` that exceed the chat attachment limit
    async fn split(
        &self,
        ctx: StageContext<'_>,
        dir: &Path,
        exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
