//! Registration and download admission.

use super::TaskController;
use crate::admission::{Admission, WakeOutcome};
use crate::error::{Error, ErrorKind};
use crate::job::Job;
use crate::registry::TaskStatus;
use crate::types::{Event, Phase, TaskState};

impl TaskController {
    /// Register a job and wait for a download slot
    ///
    /// Returns `true` once the job holds a download slot and acquisition may
    /// start. Returns `false` if the job must not start: it was cancelled or
    /// withdrawn while queued, or it disappeared from the registry. In every
    /// `false` case the job holds no slot when this returns.
    pub async fn admit_download(&self, job: &Job) -> bool {
        let id = job.id;
        let chat_id = job.origin.chat_id;

        let count = self
            .registry
            .register(id, TaskStatus::acquiring(job.name.clone(), job.gid.clone()))
            .await;
        tracing::debug!(job_id = %id, %chat_id, tasks = count, "task registered");
        self.emit_event(Event::Registered {
            id,
            name: job.name.clone(),
        });
        self.intervals
            .ensure(
                chat_id,
                self.config.download.status_update_interval,
                self.broadcaster.clone(),
            )
            .await;

        if job.options.bypasses_download_queue() {
            self.admission.force_admit(id, Phase::Download).await;
            self.refresh_status(chat_id).await;
            return true;
        }

        let ticket = match self.admission.try_admit(id, Phase::Download).await {
            Admission::Admitted => {
                self.refresh_status(chat_id).await;
                return true;
            }
            Admission::Queued(ticket) => ticket,
        };

        tracing::info!(job_id = %id, name = %job.name, "Added to download queue");
        self.registry.set_state(id, TaskState::QueuedForDownload).await;
        self.refresh_status(chat_id).await;

        let cancel = job.cancel_token();
        let outcome = tokio::select! {
            outcome = ticket.wait() => outcome,
            _ = cancel.cancelled() => {
                self.fail_download(job, "Task cancelled while queued", ErrorKind::Cancelled)
                    .await;
                return false;
            }
        };

        match outcome {
            WakeOutcome::Abandoned => {
                let reason = Error::AdmissionAbandoned {
                    id,
                    phase: Phase::Download,
                };
                tracing::debug!(job_id = %id, %reason, "download wait abandoned");
                false
            }
            WakeOutcome::Admitted => {
                if !self.registry.set_state(id, TaskState::Acquiring).await {
                    // Removed while queued; hand the slot straight back
                    self.admission.release(id, Phase::Download).await;
                    return false;
                }
                tracing::info!(job_id = %id, name = %job.name, "Start from queued download");
                true
            }
        }
    }

    /// Acquisition engine accepted the job
    ///
    /// Records the incomplete-task entry when persistence applies to the job.
    pub async fn on_download_start(&self, job: &Job) {
        tracing::info!(job_id = %job.id, name = %job.name, gid = %job.gid, "Download started");
        self.registry
            .replace(
                job.id,
                TaskStatus::acquiring(job.name.clone(), job.gid.clone()),
            )
            .await;
        self.record_incomplete(job).await;
    }
}
