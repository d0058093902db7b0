//! Acquisition finished: coalescing, post-processing, upload admission, sink dispatch.

use super::TaskController;
use crate::admission::{Admission, WakeOutcome};
use crate::error::Error;
use crate::job::{Exclusions, Job};
use crate::post_processing::{PipelineOutcome, UploadCandidate};
use crate::registry::TaskStatus;
use crate::same_dir::Arrival;
use crate::sink::UploadRequest;
use crate::types::{Event, Phase, SinkKind, TaskState};
use crate::utils::{clean_download, get_path_size, resolve_download_name};

impl TaskController {
    /// The acquisition engine finished downloading `job`
    ///
    /// Drives the job to a terminal state: either an upload whose result goes
    /// through [`on_upload_complete`](Self::on_upload_complete), or one of the
    /// error paths. Returns once the job is done with, except for seeding jobs
    /// which stay registered.
    pub async fn on_download_complete(&self, mut job: Job) {
        let id = job.id;

        if !self.registry.contains(id).await {
            tracing::debug!(job_id = %id, "completion for a task that is no longer registered");
            return;
        }

        if let Some(group) = job.same_dir.clone() {
            self.registry.set_state(id, TaskState::Coalescing).await;
            match group.arrive(id, job.dir.clone()).await {
                Arrival::Independent => {}
                Arrival::Deferred => {
                    self.finish_deferred(&job).await;
                    return;
                }
                Arrival::Last { siblings } => {
                    match group.merge_into(&job.dir, &siblings).await {
                        Ok(files) => {
                            tracing::info!(job_id = %id, group = group.name(), siblings = siblings.len(), files, "merged same-directory siblings");
                            self.emit_event(Event::Merged { id, files });
                            job.name = group.name().to_string();
                        }
                        Err(e) => {
                            for sibling in &siblings {
                                clean_download(&sibling.dir).await;
                            }
                            self.on_pipeline_error(&job, &e).await;
                            return;
                        }
                    }
                }
            }
        }

        if !job.options.is_torrent {
            job.options.seed = false;
        }

        let name_exists = !job.name.is_empty()
            && tokio::fs::try_exists(job.up_path()).await.unwrap_or(false);
        if !name_exists {
            match resolve_download_name(&job.dir).await {
                Ok(name) => job.name = name,
                Err(e) => {
                    self.on_pipeline_error(&job, &e).await;
                    return;
                }
            }
        }

        job.size = get_path_size(&job.up_path()).await;
        self.registry.set_progress(id, &job.name, job.size).await;
        tracing::info!(job_id = %id, name = %job.name, size = job.size, "Download completed");
        self.emit_event(Event::DownloadComplete {
            id,
            name: job.name.clone(),
            size: job.size,
        });

        // Under a combined ceiling the slot is handed over at upload admission
        if self.config.queue.queue_all == 0 {
            self.admission.release(id, Phase::Download).await;
        }

        let mut exclusions = Exclusions::default();
        let candidate = match self.post_processor.run(&mut job, &mut exclusions).await {
            Ok(PipelineOutcome::Ready(candidate)) => candidate,
            Ok(PipelineOutcome::Cancelled) => {
                self.on_pipeline_error(&job, &Error::Cancelled { id }).await;
                return;
            }
            Err(e) => {
                self.on_pipeline_error(&job, &e).await;
                return;
            }
        };

        if !self.acquire_upload_slot(&job).await {
            return;
        }

        self.upload(job, candidate, exclusions).await;
    }

    /// Wait for an upload slot; `false` means the job is finished with
    async fn acquire_upload_slot(&self, job: &Job) -> bool {
        let id = job.id;
        let chat_id = job.origin.chat_id;

        if job.options.bypasses_upload_queue() {
            self.admission.force_admit(id, Phase::Upload).await;
            return true;
        }

        let ticket = match self.admission.try_admit(id, Phase::Upload).await {
            Admission::Admitted => return true,
            Admission::Queued(ticket) => ticket,
        };

        tracing::info!(job_id = %id, name = %job.name, "Added to upload queue");
        self.registry
            .replace(
                id,
                TaskStatus {
                    name: job.name.clone(),
                    size: job.size,
                    gid: job.gid.clone(),
                    state: TaskState::QueuedForUpload,
                },
            )
            .await;
        self.refresh_status(chat_id).await;

        let cancel = job.cancel_token();
        let outcome = tokio::select! {
            outcome = ticket.wait() => outcome,
            _ = cancel.cancelled() => {
                self.on_pipeline_error(job, &Error::Cancelled { id }).await;
                return false;
            }
        };

        if outcome == WakeOutcome::Abandoned {
            let reason = Error::AdmissionAbandoned {
                id,
                phase: Phase::Upload,
            };
            tracing::debug!(job_id = %id, %reason, "upload wait abandoned");
            return false;
        }
        if !self.registry.contains(id).await {
            // Torn down while queued; give the slot back without a second report
            self.admission.release(id, Phase::Upload).await;
            return false;
        }

        tracing::info!(job_id = %id, name = %job.name, "Start from queued upload");
        true
    }

    /// Hand the candidate to the selected sink and route its result
    async fn upload(&self, mut job: Job, candidate: UploadCandidate, exclusions: Exclusions) {
        let id = job.id;

        if job.is_cancelled() {
            self.on_pipeline_error(&job, &Error::Cancelled { id }).await;
            return;
        }

        let sink_kind = job.options.sink();
        // Chat delivery sends the whole directory, the others the candidate itself
        let path = match sink_kind {
            SinkKind::Leech => candidate.dir,
            SinkKind::Drive | SinkKind::Rclone => candidate.path,
        };
        let excluded_bytes = exclusions.excluded_bytes();
        job.size = get_path_size(&path).await.saturating_sub(excluded_bytes);

        let sink = match self.sinks.get(sink_kind) {
            Ok(sink) => sink,
            Err(e) => {
                self.on_pipeline_error(&job, &e).await;
                return;
            }
        };

        let installed = self
            .registry
            .replace(
                id,
                TaskStatus::uploading(job.name.clone(), job.size, job.gid.clone(), sink_kind),
            )
            .await;
        if !installed {
            self.admission.release(id, Phase::Upload).await;
            return;
        }

        tracing::info!(job_id = %id, sink = %sink_kind, adapter = sink.name(), name = %job.name, size = job.size, "Upload started");
        self.emit_event(Event::Uploading {
            id,
            sink: sink_kind,
            path: path.clone(),
            size: job.size,
        });

        let request = UploadRequest {
            id,
            name: job.name.clone(),
            path,
            size: job.size,
            excluded: exclusions.unwanted_files,
            excluded_bytes,
            files_to_delete: exclusions.files_to_delete,
            cancel: job.cancel_token(),
        };
        let (_, result) = tokio::join!(
            self.refresh_status(job.origin.chat_id),
            sink.upload(request)
        );

        match result {
            Ok(_) if job.is_cancelled() => {
                self.on_pipeline_error(&job, &Error::Cancelled { id }).await;
            }
            Ok(outcome) => self.on_upload_complete(&job, outcome).await,
            Err(e) => self.on_pipeline_error(&job, &e).await,
        }
    }
}
