//! Error types for mirror-dl
//!
//! Every failure a job can hit falls into one of four families, reported through
//! [`Error::kind`]:
//! - acquisition failures reported by the download engine
//! - post-processing failures and cancellations
//! - admission waits abandoned because the job was withdrawn
//! - upload failures reported by a sink adapter
//!
//! Anything else (I/O, persistence, configuration) is internal.

use crate::types::{JobId, Phase, SinkKind, Stage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mirror-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mirror-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue_all")
        key: Option<String>,
    },

    /// Acquisition engine reported a failure
    #[error("download failed: {0}")]
    Acquisition(String),

    /// Post-processing stage failed
    #[error("post-processing error: {0}")]
    PostProcess(#[from] PostProcessError),

    /// Cancellation was observed at a stage boundary
    #[error("task {id} was cancelled")]
    Cancelled {
        /// The cancelled job
        id: JobId,
    },

    /// Job was withdrawn while waiting for an admission slot
    #[error("task {id} left the {phase} queue before admission")]
    AdmissionAbandoned {
        /// The withdrawn job
        id: JobId,
        /// Phase it was queued for
        phase: Phase,
    },

    /// Sink adapter failed
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job not found in the registry
    #[error("task not found: {0}")]
    NotFound(JobId),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Post-processing errors
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// A stage collaborator reported failure
    #[error("{stage} stage failed for {path}: {reason}")]
    StageFailed {
        /// The stage that failed
        stage: Stage,
        /// Path the stage was working on
        path: PathBuf,
        /// The reason the stage failed
        reason: String,
    },

    /// The final on-disk name could not be resolved
    #[error("could not resolve downloaded name in {dir}: {reason}")]
    NameResolution {
        /// The acquisition directory
        dir: PathBuf,
        /// Why resolution failed
        reason: String,
    },

    /// Moving a file during the same-directory merge failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },
}

/// Sink adapter errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// The adapter ran and reported failure
    #[error("{sink} upload failed: {reason}")]
    Failed {
        /// Sink that failed
        sink: SinkKind,
        /// Adapter-provided reason
        reason: String,
    },

    /// No adapter is configured for the selected sink
    #[error("no {0} sink is configured")]
    SinkUnavailable(SinkKind),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Failure family an [`Error`] belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Engine-reported acquisition failure
    Acquisition,
    /// Post-processing stage failure
    PostProcessing,
    /// Cancellation observed by the controller
    Cancelled,
    /// Queued job withdrawn before admission
    AdmissionAbandoned,
    /// Sink-reported upload failure
    Upload,
    /// Configuration, I/O, persistence, or other internal failure
    Internal,
}

impl Error {
    /// Classify this error into its failure family
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Acquisition(_) => ErrorKind::Acquisition,
            Error::PostProcess(_) => ErrorKind::PostProcessing,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::AdmissionAbandoned { .. } => ErrorKind::AdmissionAbandoned,
            Error::Upload(_) => ErrorKind::Upload,
            Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::NotFound(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }
}
