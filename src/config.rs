//! Configuration types for mirror-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Concurrency ceilings for the two phases
///
/// A value of `0` means unlimited. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Combined ceiling across downloads and uploads (0 = disabled)
    ///
    /// When set, a job keeps its download slot until it is admitted for upload.
    #[serde(default)]
    pub queue_all: usize,

    /// Maximum concurrent downloads (0 = unlimited)
    #[serde(default)]
    pub queue_download: usize,

    /// Maximum concurrent uploads (0 = unlimited)
    #[serde(default)]
    pub queue_upload: usize,
}

/// Directory and timing settings for the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root under which each job gets its own acquisition directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Pause between tearing down a failed job and purging its directories (default: 3 seconds)
    #[serde(default = "default_error_cleanup_delay", with = "duration_serde")]
    pub error_cleanup_delay: Duration,

    /// Pause between paginated result messages (default: 1 second)
    #[serde(default = "default_message_page_delay", with = "duration_serde")]
    pub message_page_delay: Duration,

    /// Maximum size in bytes of one result message (default: 4000)
    #[serde(default = "default_message_byte_budget")]
    pub message_byte_budget: usize,

    /// Period of the per-chat status refresh timer (default: 10 seconds)
    #[serde(default = "default_status_update_interval", with = "duration_serde")]
    pub status_update_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            error_cleanup_delay: default_error_cleanup_delay(),
            message_page_delay: default_message_page_delay(),
            message_byte_budget: default_message_byte_budget(),
            status_update_interval: default_status_update_interval(),
        }
    }
}

/// Base URLs used when rendering share links
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL of an `rclone serve` instance exposing the remotes
    #[serde(default)]
    pub rclone_serve_url: Option<String>,

    /// Base URL of a drive index (must end with `/`)
    #[serde(default)]
    pub index_url: Option<String>,
}

/// Notification configuration (webhooks)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// A webhook that receives every published message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Optional `Authorization` header value
    #[serde(default)]
    pub auth_header: Option<String>,
}

/// Incomplete-task persistence
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Record in-flight tasks so they can be reported after a restart
    #[serde(default)]
    pub incomplete_task_notifier: bool,

    /// SQLite database path (persistence is off when unset)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl PersistenceConfig {
    /// Whether both the feature flag and a storage endpoint are configured
    pub fn enabled(&self) -> bool {
        self.incomplete_task_notifier && self.database_path.is_some()
    }
}

/// Main configuration for the task controller
///
/// Fields are organized into logical sub-configs:
/// - [`queue`](QueueConfig) - concurrency ceilings
/// - [`download`](DownloadConfig) - directories and lifecycle timing
/// - [`links`](LinkConfig) - share-link base URLs
/// - [`notifications`](NotificationConfig) - webhooks
/// - [`persistence`](PersistenceConfig) - incomplete-task records
///
/// All sub-config fields except persistence are flattened, so the serialized form
/// is a flat object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency ceilings
    #[serde(flatten)]
    pub queue: QueueConfig,

    /// Directories and lifecycle timing
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Share-link base URLs
    #[serde(flatten)]
    pub links: LinkConfig,

    /// Webhooks
    #[serde(flatten)]
    pub notifications: NotificationConfig,

    /// Incomplete-task records
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let QueueConfig {
            queue_all,
            queue_download,
            queue_upload,
        } = self.queue;

        if queue_all > 0 {
            for (key, value) in [("queue_download", queue_download), ("queue_upload", queue_upload)]
            {
                if value > queue_all {
                    return Err(Error::Config {
                        message: format!(
                            "{key} ({value}) cannot exceed queue_all ({queue_all})"
                        ),
                        key: Some(key.to_string()),
                    });
                }
            }
        }

        if self.download.message_byte_budget == 0 {
            return Err(Error::Config {
                message: "message_byte_budget must be greater than zero".to_string(),
                key: Some("message_byte_budget".to_string()),
            });
        }

        if let Some(webhook) = self.notifications.webhooks.iter().find(|w| w.url.is_empty()) {
            return Err(Error::Config {
                message: format!("webhook with timeout {:?} has an empty url", webhook.timeout),
                key: Some("webhooks".to_string()),
            });
        }

        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_error_cleanup_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_message_page_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_message_byte_budget() -> usize {
    4000
}

fn default_status_update_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

// Durations are (de)serialized as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
