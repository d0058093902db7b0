//! Outbound seams: chat notifications, status messages, acquisition engine
//!
//! Rendering and delivering chat messages, keeping the per-chat status message
//! fresh, and driving the acquisition engine all happen outside this crate. The
//! controller only talks to them through the traits below.

use crate::error::Result;
use crate::types::ChatId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod intervals;
mod webhook;

pub use intervals::StatusIntervals;
pub use webhook::{WebhookNotifier, WebhookPayload};

/// A URL button attached to a published message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    /// Button caption
    pub label: String,
    /// Target URL
    pub url: String,
}

impl LinkButton {
    /// Create a button
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Delivers rendered messages to a chat
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish an HTML-formatted message, optionally with link buttons
    async fn publish(&self, chat_id: ChatId, message: &str, buttons: Option<&[LinkButton]>)
    -> Result<()>;
}

/// Keeps the per-chat status message in sync with the registry
#[async_trait]
pub trait StatusBroadcaster: Send + Sync {
    /// Re-render the status message of `chat_id`
    async fn refresh(&self, chat_id: ChatId) -> Result<()>;

    /// Delete every status message (called when nothing is left to show)
    async fn clear(&self) -> Result<()>;
}

/// The acquisition engine, as far as the controller needs it
#[async_trait]
pub trait AcquisitionEngine: Send + Sync {
    /// Drop finished and errored transfers from the engine's own bookkeeping
    async fn purge(&self) -> Result<()>;
}
