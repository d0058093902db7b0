//! Periodic per-chat status refresh timers

use super::StatusBroadcaster;
use crate::types::ChatId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One refresh timer per chat with a visible status message
#[derive(Clone, Default)]
pub struct StatusIntervals {
    timers: Arc<Mutex<HashMap<ChatId, CancellationToken>>>,
}

impl StatusIntervals {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Start refreshing `chat_id` every `period`, unless a timer already runs
    ///
    /// Returns `true` if a new timer was spawned.
    pub async fn ensure(
        &self,
        chat_id: ChatId,
        period: Duration,
        broadcaster: Arc<dyn StatusBroadcaster>,
    ) -> bool {
        let mut timers = self.timers.lock().await;
        if timers.contains_key(&chat_id) {
            return false;
        }

        let cancel_token = CancellationToken::new();
        timers.insert(chat_id, cancel_token.clone());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = broadcaster.refresh(chat_id).await {
                            tracing::warn!(%chat_id, error = %e, "periodic status refresh failed");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        break;
                    }
                }
            }
        });
        true
    }

    /// Stop and forget every timer
    pub async fn cancel_all(&self) -> usize {
        let mut timers = self.timers.lock().await;
        let count = timers.len();
        for (_, token) in timers.drain() {
            token.cancel();
        }
        count
    }

    /// Number of running timers
    pub async fn len(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Whether no timer is running
    pub async fn is_empty(&self) -> bool {
        self.timers.lock().await.is_empty()
    }
}
