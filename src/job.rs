//! Job model: one user-submitted transfer request

use crate::same_dir::SameDirGroup;
use crate::types::{ChatId, JobId, SinkKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Per-job behaviour flags chosen at submission time
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Deliver as chat attachments instead of uploading to a remote
    #[serde(default)]
    pub is_leech: bool,
    /// Upload destination: a drive folder id or an rclone `remote:path`
    #[serde(default)]
    pub up_dest: String,
    /// Job comes from a torrent engine (seeding is only possible then)
    #[serde(default)]
    pub is_torrent: bool,
    /// Keep seeding after upload instead of purging the source
    #[serde(default)]
    pub seed: bool,
    /// Merge split parts before anything else
    #[serde(default)]
    pub join: bool,
    /// Extract archives
    #[serde(default)]
    pub extract: bool,
    /// Convert audio streams
    #[serde(default)]
    pub convert_audio: bool,
    /// Convert video streams
    #[serde(default)]
    pub convert_video: bool,
    /// Generate a sample clip
    #[serde(default)]
    pub sample_video: bool,
    /// Compress the result into an archive
    #[serde(default)]
    pub compress: bool,
    /// Bypass both download and upload queues
    #[serde(default)]
    pub force_run: bool,
    /// Bypass the download queue only
    #[serde(default)]
    pub force_download: bool,
    /// Bypass the upload queue only
    #[serde(default)]
    pub force_upload: bool,
    /// Upload to the submitter's own drive/remote; hides shared rclone links
    #[serde(default)]
    pub private_link: bool,
    /// Submitter's personal index URL, used with `private_link`
    #[serde(default)]
    pub user_index_url: Option<String>,
}

impl JobOptions {
    /// Sink this job will be dispatched to
    pub fn sink(&self) -> SinkKind {
        SinkKind::select(self.is_leech, &self.up_dest)
    }

    /// Whether the job skips the download queue
    pub fn bypasses_download_queue(&self) -> bool {
        self.force_run || self.force_download
    }

    /// Whether the job skips the upload queue
    pub fn bypasses_upload_queue(&self) -> bool {
        self.force_run || self.force_upload
    }
}

/// Files a post-processing stage wants kept out of the upload
#[derive(Clone, Debug, Default)]
pub struct Exclusions {
    /// Paths the sink must skip
    pub unwanted_files: Vec<PathBuf>,
    /// Sizes of the skipped files, subtracted from the reported size
    pub unwanted_sizes: Vec<u64>,
    /// Intermediate files the sink should delete once it has read past them
    pub files_to_delete: Vec<PathBuf>,
}

impl Exclusions {
    /// Total bytes excluded from the upload
    pub fn excluded_bytes(&self) -> u64 {
        self.unwanted_sizes.iter().sum()
    }
}

/// Submitter identity used for notifications and persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Origin {
    /// Chat the job was submitted from
    pub chat_id: ChatId,
    /// Link to the submitting message
    pub message_link: String,
    /// Mention of the submitting user, appended to every notice
    pub tag: String,
    /// Submitted from a group chat (persistence only applies there)
    #[serde(default)]
    pub is_super_chat: bool,
}

/// A transfer job
///
/// Owned by its execution context. External actors hold a clone of the
/// cancellation token (see [`Job::cancel_token`]) and never the job itself.
#[derive(Debug)]
pub struct Job {
    /// Unique id (the submitting message id)
    pub id: JobId,
    /// Submitter identity
    pub origin: Origin,
    /// Acquisition directory, `<download_dir>/<id>`
    pub dir: PathBuf,
    /// Secondary working directory used by some stages
    pub new_dir: Option<PathBuf>,
    /// Display name; updated once the final on-disk name is known
    pub name: String,
    /// Byte size; recomputed after every stage
    pub size: u64,
    /// Behaviour flags
    pub options: JobOptions,
    /// Group shared with siblings submitted in the same multi-item request
    pub same_dir: Option<Arc<SameDirGroup>>,
    /// Engine-side identifier (gid/hash) shown in status output
    pub gid: String,
    cancel: CancellationToken,
    reported: Arc<AtomicBool>,
}

impl Job {
    /// Create a job rooted at `download_dir/<id>`
    pub fn new(id: JobId, origin: Origin, download_dir: &std::path::Path, options: JobOptions) -> Self {
        Self {
            id,
            origin,
            dir: download_dir.join(id.to_string()),
            new_dir: None,
            name: String::new(),
            size: 0,
            options,
            same_dir: None,
            gid: String::new(),
            cancel: CancellationToken::new(),
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach the job to a same-directory group
    pub fn with_same_dir(mut self, group: Arc<SameDirGroup>) -> Self {
        self.same_dir = Some(group);
        self
    }

    /// Set the expected display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Token an external actor can use to cancel this job
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Flag the job as cancelled
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the job has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Path of the current upload candidate
    pub fn up_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Mark the job's failure as reported; returns `true` only the first time
    pub(crate) fn claim_failure_report(&self) -> bool {
        !self.reported.swap(true, Ordering::AcqRel)
    }
}
