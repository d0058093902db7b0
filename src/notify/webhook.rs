//! Webhook-backed notifier

use super::{LinkButton, Notifier};
use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::types::ChatId;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

/// JSON body POSTed to every webhook
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Chat the message is addressed to
    pub chat_id: ChatId,
    /// Rendered HTML message
    pub message: String,
    /// Link buttons, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<LinkButton>,
    /// Unix timestamp of publication
    pub timestamp: i64,
}

/// Publishes every message to the configured webhooks
///
/// All webhooks are called concurrently. A failing webhook does not stop the
/// others; the last failure is returned so the caller can log it.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhooks: Vec<WebhookConfig>,
}

impl WebhookNotifier {
    /// Create a notifier for `webhooks`
    pub fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhooks,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(
        &self,
        chat_id: ChatId,
        message: &str,
        buttons: Option<&[LinkButton]>,
    ) -> Result<()> {
        if self.webhooks.is_empty() {
            return Ok(());
        }

        let payload = WebhookPayload {
            chat_id,
            message: message.to_string(),
            buttons: buttons.map(<[LinkButton]>::to_vec).unwrap_or_default(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let results = join_all(self.webhooks.iter().map(|webhook| self.send(webhook, &payload))).await;
        results.into_iter().filter_map(|r| r.err()).last().map_or(Ok(()), Err)
    }
}

impl WebhookNotifier {
    async fn send(&self, webhook: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
        let mut request = self
            .client
            .post(&webhook.url)
            .json(payload)
            .timeout(webhook.timeout);

        if let Some(auth) = &webhook.auth_header {
            request = request.header("Authorization", auth);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %webhook.url, chat_id = %payload.chat_id, "webhook sent successfully");
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error_msg = format!("Webhook returned status {status}: {body}");
                tracing::warn!(url = %webhook.url, error = %error_msg, "webhook failed");
                Err(Error::Other(error_msg))
            }
            Err(e) => {
                tracing::warn!(url = %webhook.url, error = %e, "webhook failed");
                Err(Error::Network(e))
            }
        }
    }
}
