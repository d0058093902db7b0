//! Core types for mirror-dl

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a job (one per submission)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of the chat a job was submitted from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two halves of a job's life
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Acquisition ("download")
    Download,
    /// Dissemination ("upload")
    Upload,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Download => f.write_str("download"),
            Phase::Upload => f.write_str("upload"),
        }
    }
}

/// Post-processing stage, in pipeline order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Merge split parts (`.001`, `.002`, ...) back into whole files
    Join,
    /// Archive extraction
    Extract,
    /// Audio/video conversion
    Convert,
    /// Sample clip generation
    Sample,
    /// Archive compression
    Compress,
    /// Splitting oversized files for chat delivery
    Split,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Join => "join",
            Stage::Extract => "extract",
            Stage::Convert => "convert",
            Stage::Sample => "sample",
            Stage::Compress => "compress",
            Stage::Split => "split",
        };
        f.write_str(s)
    }
}

/// Dissemination backend a job is delivered to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Chat-attachment delivery ("leech")
    Leech,
    /// Cloud-drive upload
    Drive,
    /// Remote-storage sync (rclone)
    Rclone,
}

impl SinkKind {
    /// Choose the sink for a job: leech mode wins, then drive identifiers, else rclone
    pub fn select(is_leech: bool, up_dest: &str) -> Self {
        if is_leech {
            SinkKind::Leech
        } else if crate::utils::is_drive_id(up_dest) {
            SinkKind::Drive
        } else {
            SinkKind::Rclone
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Leech => f.write_str("leech"),
            SinkKind::Drive => f.write_str("drive"),
            SinkKind::Rclone => f.write_str("rclone"),
        }
    }
}

/// Visible lifecycle state of a registered job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a download slot
    QueuedForDownload,
    /// Acquisition engine is running
    Acquiring,
    /// Waiting on same-directory siblings
    Coalescing,
    /// Running a post-processing stage
    PostProcessing {
        /// Stage currently running
        stage: Stage,
    },
    /// Waiting for an upload slot
    QueuedForUpload,
    /// Sink adapter is running
    Uploading {
        /// Sink the job was dispatched to
        sink: SinkKind,
    },
    /// Upload finished and source retained for seeding
    Seeding,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job became visible in the registry
    Registered {
        /// Job ID
        id: JobId,
        /// Display name
        name: String,
    },

    /// Job placed on a phase waiting-list
    Queued {
        /// Job ID
        id: JobId,
        /// Phase the job is waiting for
        phase: Phase,
    },

    /// Job promoted from a waiting-list into an admission slot
    StartedFromQueue {
        /// Job ID
        id: JobId,
        /// Phase the job was admitted for
        phase: Phase,
    },

    /// Acquisition engine reported completion
    DownloadComplete {
        /// Job ID
        id: JobId,
        /// Resolved on-disk name
        name: String,
        /// Size in bytes
        size: u64,
    },

    /// Job merged its files into a same-directory sibling and stopped
    Coalesced {
        /// Job ID
        id: JobId,
    },

    /// Same-directory merge ran
    Merged {
        /// Surviving job that received the files
        id: JobId,
        /// Number of files moved
        files: usize,
    },

    /// Post-processing stage started
    StageStarted {
        /// Job ID
        id: JobId,
        /// Stage
        stage: Stage,
    },

    /// Sink adapter invoked
    Uploading {
        /// Job ID
        id: JobId,
        /// Sink chosen
        sink: SinkKind,
        /// Path handed to the sink
        path: PathBuf,
        /// Size in bytes after exclusions
        size: u64,
    },

    /// Job completed successfully
    Complete {
        /// Job ID
        id: JobId,
        /// Display name
        name: String,
    },

    /// Job failed (download or upload side)
    Failed {
        /// Job ID
        id: JobId,
        /// Failure family
        kind: ErrorKind,
        /// Error message
        error: String,
    },

    /// Registry became empty and the controller quiesced
    Quiesced,
}
