//! Error paths, soft exits, and quiescing.
//!
//! Both error handlers are idempotent: the registry removal, group detach and
//! admission withdrawal are all no-ops the second time, and only the first call
//! for a job publishes a notice.

use super::TaskController;
use crate::error::{Error, ErrorKind};
use crate::job::Job;
use crate::types::Event;
use crate::utils::{clean_download, escape_html};

/// Notice sent to a sibling that left its files for the rest of its group
const DEFERRED_NOTICE: &str = "Downloaded! Waiting for other tasks...";

impl TaskController {
    /// The acquisition engine reported a failure
    pub async fn on_download_error(&self, job: &Job, error: &str) {
        self.fail_download(job, error, ErrorKind::Acquisition).await;
    }

    /// A sink reported an upload failure
    pub async fn on_upload_error(&self, job: &Job, error: &str) {
        let message = format!("{} {}", job.origin.tag, escape_html(error));
        self.fail(job, error, ErrorKind::Upload, &message).await;
    }

    /// Download-side exit with an explicit failure family
    pub(crate) async fn fail_download(&self, job: &Job, error: &str, kind: ErrorKind) {
        let message = format!("{} Download: {}", job.origin.tag, escape_html(error));
        self.fail(job, error, kind, &message).await;
    }

    /// Anything between acquisition and the sink's answer failed, cancellation included
    pub(crate) async fn on_pipeline_error(&self, job: &Job, err: &Error) {
        let error = err.to_string();
        let message = format!("{} {}", job.origin.tag, escape_html(&error));
        self.fail(job, &error, err.kind(), &message).await;
    }

    async fn fail(&self, job: &Job, error: &str, kind: ErrorKind, message: &str) {
        let id = job.id;
        let chat_id = job.origin.chat_id;

        let remaining = self.registry.remove(id).await;
        let orphans = match &job.same_dir {
            Some(group) => group.detach(id).await,
            None => Vec::new(),
        };

        if job.claim_failure_report() {
            tracing::error!(job_id = %id, %chat_id, name = %job.name, ?kind, error, "task failed");
            self.publish(chat_id, message, None).await;
            self.emit_event(Event::Failed {
                id,
                kind,
                error: error.to_string(),
            });
        } else {
            tracing::debug!(job_id = %id, error, "failure already reported");
        }

        self.refresh_or_quiesce(remaining, chat_id).await;
        self.clear_incomplete(job).await;

        // Frees both slots, fires any pending wake signal, then sweeps
        self.admission.withdraw(id).await;

        tokio::time::sleep(self.config.download.error_cleanup_delay).await;
        clean_download(&job.dir).await;
        if let Some(new_dir) = &job.new_dir {
            clean_download(new_dir).await;
        }
        for orphan in orphans {
            tracing::debug!(job_id = %id, sibling = %orphan.id, "purging orphaned sibling");
            clean_download(&orphan.dir).await;
        }
    }

    /// A same-directory sibling handed its files to the group and stops here
    ///
    /// Not a failure: the directory is left for the last sibling to merge.
    pub(crate) async fn finish_deferred(&self, job: &Job) {
        let id = job.id;
        let chat_id = job.origin.chat_id;

        let remaining = self.registry.remove(id).await;
        tracing::info!(job_id = %id, name = %job.name, "waiting for same-directory siblings");
        self.publish(chat_id, &format!("{} {}", job.origin.tag, DEFERRED_NOTICE), None)
            .await;
        self.emit_event(Event::Coalesced { id });

        self.refresh_or_quiesce(remaining, chat_id).await;
        self.clear_incomplete(job).await;
        self.admission.withdraw(id).await;
    }

    /// Nothing is registered any more: stop timers, purge the engine, drop status messages
    ///
    /// Every failure here is logged and swallowed.
    pub async fn quiesce(&self) {
        let timers = self.intervals.cancel_all().await;
        let (purged, cleared) = tokio::join!(self.engine.purge(), self.broadcaster.clear());
        if let Err(e) = purged {
            tracing::warn!(error = %e, "engine purge failed");
        }
        if let Err(e) = cleared {
            tracing::warn!(error = %e, "failed to delete status messages");
        }
        tracing::debug!(timers, "controller quiesced");
        self.emit_event(Event::Quiesced);
    }
}
