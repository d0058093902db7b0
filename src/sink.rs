//! Dissemination backends ("sinks")
//!
//! The byte-moving clients for chat delivery, cloud drive, and rclone live
//! outside this crate. They plug in through [`TransferSink`]; the controller
//! picks one per job with [`SinkKind::select`] and matches the returned
//! [`UploadOutcome`] exhaustively.

use crate::error::{Result, UploadError};
use crate::types::{JobId, SinkKind};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a sink needs for one upload
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Job being uploaded
    pub id: JobId,
    /// Display name
    pub name: String,
    /// Path to upload (a directory for leech delivery)
    pub path: PathBuf,
    /// Size in bytes after exclusions
    pub size: u64,
    /// Paths to skip
    pub excluded: Vec<PathBuf>,
    /// Total bytes of the skipped paths
    pub excluded_bytes: u64,
    /// Intermediate files the sink deletes as it goes
    pub files_to_delete: Vec<PathBuf>,
    /// Job cancellation token; adapters should stop early once it fires
    pub cancel: CancellationToken,
}

/// One file delivered as a chat attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveredFile {
    /// Link to the sent message
    pub link: String,
    /// File name
    pub name: String,
}

/// What a sink reports after a successful upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Chat-attachment delivery
    Leech {
        /// Delivered files, in send order
        files: Vec<DeliveredFile>,
        /// Number of files sent
        total_files: usize,
        /// Files that could not be sent
        corrupted: usize,
    },
    /// Cloud-drive or rclone upload
    Cloud {
        /// Direct link, when the backend produced one
        link: Option<String>,
        /// Files uploaded
        files: usize,
        /// Sub-folders uploaded
        folders: usize,
        /// MIME type, or `"Folder"`
        mime_type: String,
        /// rclone `remote:path`, when uploaded via rclone
        remote_path: Option<String>,
        /// Drive folder id, when uploaded to a drive
        dir_id: Option<String>,
    },
}

/// A dissemination backend
#[async_trait]
pub trait TransferSink: Send + Sync {
    /// Upload one job's output
    ///
    /// Called once per job. Errors are routed to the job's upload error path.
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// The three sink adapters, indexed by [`SinkKind`]
#[derive(Clone, Default)]
pub struct SinkSet {
    /// Chat-attachment delivery
    pub leech: Option<Arc<dyn TransferSink>>,
    /// Cloud-drive upload
    pub drive: Option<Arc<dyn TransferSink>>,
    /// rclone sync
    pub rclone: Option<Arc<dyn TransferSink>>,
}

impl SinkSet {
    /// Adapter for `kind`
    pub fn get(&self, kind: SinkKind) -> Result<Arc<dyn TransferSink>> {
        let sink = match kind {
            SinkKind::Leech => &self.leech,
            SinkKind::Drive => &self.drive,
            SinkKind::Rclone => &self.rclone,
        };
        sink.clone()
            .ok_or_else(|| UploadError::SinkUnavailable(kind).into())
    }
}
