//! Pass-through media processor

use super::traits::{ConvertTargets, MediaProcessor, StageContext, StageOutcome};
use crate::job::Exclusions;
use async_trait::async_trait;
use std::path::Path;

/// Media processor used when no external tools are wired in
///
/// Every stage leaves the files untouched and returns the path it was given,
/// so jobs that request processing still flow through to upload.
pub struct NoOpMediaProcessor;

#[async_trait]
impl MediaProcessor for NoOpMediaProcessor {
    async fn join_parts(&self, _ctx: StageContext<'_>, _dir: &Path) -> crate::Result<()> {
        Ok(())
    }

    async fn extract(&self, _ctx: StageContext<'_>, path: &Path) -> crate::Result<StageOutcome> {
        Ok(StageOutcome::Completed(path.to_path_buf()))
    }

    async fn convert(
        &self,
        _ctx: StageContext<'_>,
        path: &Path,
        _targets: ConvertTargets,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        Ok(StageOutcome::Completed(path.to_path_buf()))
    }

    async fn sample(
        &self,
        _ctx: StageContext<'_>,
        path: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        Ok(StageOutcome::Completed(path.to_path_buf()))
    }

    async fn compress(
        &self,
        _ctx: StageContext<'_>,
        path: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        Ok(StageOutcome::Completed(path.to_path_buf()))
    }

    async fn split(
        &self,
        _ctx: StageContext<'_>,
        dir: &Path,
        _exclusions: &mut Exclusions,
    ) -> crate::Result<StageOutcome> {
        Ok(StageOutcome::Completed(dir.to_path_buf()))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
