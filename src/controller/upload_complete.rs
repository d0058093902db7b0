//! Upload finished: report, then either keep seeding or clean up.

use super::TaskController;
use super::summary::{CloudResult, cloud_summary, header, leech_pages};
use crate::job::Job;
use crate::sink::UploadOutcome;
use crate::types::{Event, Phase, TaskState};
use crate::utils::{clean_download, clean_target};

impl TaskController {
    /// A sink reported success for `job`
    ///
    /// Publishes the result, then either keeps the source for seeding or purges
    /// it and deregisters the job. The upload slot is always released last.
    pub async fn on_upload_complete(&self, job: &Job, outcome: UploadOutcome) {
        let id = job.id;
        let chat_id = job.origin.chat_id;

        self.clear_incomplete(job).await;
        tracing::info!(job_id = %id, name = %job.name, size = job.size, "Task done");

        let head = header(&job.name, job.size);
        match &outcome {
            UploadOutcome::Leech {
                files,
                total_files,
                corrupted,
            } => {
                let mut msg = format!("{head}\n<b>Total Files: </b>{total_files}");
                if *corrupted != 0 {
                    msg.push_str(&format!("\n<b>Corrupted Files: </b>{corrupted}"));
                }
                msg.push_str(&format!("\n<b>cc: </b>{}\n\n", job.origin.tag));

                let pages = leech_pages(&msg, files, self.config.download.message_byte_budget);
                for (index, page) in pages.iter().enumerate() {
                    if index > 0 {
                        tokio::time::sleep(self.config.download.message_page_delay).await;
                    }
                    self.publish(chat_id, page, None).await;
                }
            }
            UploadOutcome::Cloud {
                link,
                files,
                folders,
                mime_type,
                remote_path,
                dir_id,
            } => {
                let result = CloudResult {
                    link: link.as_deref(),
                    files: *files,
                    folders: *folders,
                    mime_type,
                    remote_path: remote_path.as_deref(),
                    dir_id: dir_id.as_deref(),
                };
                let (msg, buttons) = cloud_summary(
                    &head,
                    &result,
                    &job.options,
                    &self.config.links,
                    &job.origin.tag,
                );
                let buttons = (!buttons.is_empty()).then_some(buttons.as_slice());
                self.publish(chat_id, &msg, buttons).await;
            }
        }

        if job.options.seed && job.options.is_torrent {
            if let Some(new_dir) = &job.new_dir {
                clean_target(new_dir).await;
            }
            self.registry.set_state(id, TaskState::Seeding).await;
            tracing::info!(job_id = %id, name = %job.name, "seeding after upload");
            self.admission.release(id, Phase::Upload).await;
            self.emit_event(Event::Complete {
                id,
                name: job.name.clone(),
            });
            return;
        }

        clean_download(&job.dir).await;
        let remaining = self.registry.remove(id).await;
        self.refresh_or_quiesce(remaining, chat_id).await;

        self.admission.release(id, Phase::Upload).await;
        self.emit_event(Event::Complete {
            id,
            name: job.name.clone(),
        });
    }
}
