//! # mirror-dl
//!
//! Admission and lifecycle control for mirror/leech transfer jobs.
//!
//! A job is acquired by an external engine, optionally post-processed, then
//! handed to a sink (chat attachments, a drive folder, or an rclone remote).
//! This crate decides when each job may start each phase, coalesces jobs that
//! share a destination folder, drives the post-processing stages, and routes
//! every outcome to the right notification and cleanup.
//!
//! Acquisition, media tools, chat rendering and the sinks themselves live
//! outside the crate and are plugged in through traits ([`TransferSink`],
//! [`MediaProcessor`], [`Notifier`], [`StatusBroadcaster`], [`AcquisitionEngine`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use mirror_dl::{Collaborators, Config, Job, JobId, JobOptions, Origin, TaskController};
//! # use std::sync::Arc;
//! # async fn run(
//! #     notifier: Arc<dyn mirror_dl::Notifier>,
//! #     broadcaster: Arc<dyn mirror_dl::StatusBroadcaster>,
//! #     engine: Arc<dyn mirror_dl::AcquisitionEngine>,
//! # ) -> mirror_dl::Result<()> {
//! let controller =
//!     TaskController::new(Config::default(), Collaborators::new(notifier, broadcaster, engine))
//!         .await?;
//!
//! let origin = Origin {
//!     chat_id: mirror_dl::ChatId(-100),
//!     message_link: "https://t.me/c/100/42".into(),
//!     tag: "@alice".into(),
//!     is_super_chat: true,
//! };
//! let job = Job::new(JobId(42), origin, controller.get_config().download_dir(), JobOptions::default());
//!
//! if controller.admit_download(&job).await {
//!     controller.on_download_start(&job).await;
//!     // ... the acquisition engine fills job.dir ...
//!     controller.on_download_complete(job).await;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Per-phase admission sets and waiting-lists
pub mod admission;
/// Configuration types
pub mod config;
/// Job lifecycle controller (decomposed into focused submodules)
pub mod controller;
/// Incomplete-task persistence
pub mod db;
/// Error types
pub mod error;
/// Job model
pub mod job;
/// Notification, status and engine seams
pub mod notify;
/// Post-processing pipeline
pub mod post_processing;
/// Live job registry
pub mod registry;
/// Same-directory coalescing
pub mod same_dir;
/// Sink adapter seam
pub mod sink;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use admission::{Admission, AdmissionController, QueueLimits, QueueTicket, WakeOutcome};
pub use config::Config;
pub use controller::{Collaborators, TaskController};
pub use db::{Database, IncompleteTask, IncompleteTaskStore};
pub use error::{DatabaseError, Error, ErrorKind, PostProcessError, Result, UploadError};
pub use job::{Exclusions, Job, JobOptions, Origin};
pub use notify::{AcquisitionEngine, LinkButton, Notifier, StatusBroadcaster, WebhookNotifier};
pub use post_processing::{MediaProcessor, NoOpMediaProcessor, StageOutcome};
pub use registry::{TaskRegistry, TaskStatus};
pub use same_dir::SameDirGroup;
pub use sink::{DeliveredFile, SinkSet, TransferSink, UploadOutcome, UploadRequest};
pub use types::{ChatId, Event, JobId, Phase, SinkKind, Stage, TaskState};
