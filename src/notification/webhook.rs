//! Webhook notification transport.
//!
//! Posts the alert trigger context as JSON to the rule's target URL, using a
//! retryable HTTP client so transient transport errors are absorbed inside
//! the hand-off.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;

use crate::notification::{error::NotificationError, traits::Notifier};

/// Delivers alerts by POSTing JSON to the alert target URL.
#[derive(Debug)]
pub struct WebhookNotifier {
    client: ClientWithMiddleware,
}

impl WebhookNotifier {
    /// Creates a notifier over a configured HTTP client.
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        _alert_type: &str,
        alert_target: &str,
        context: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(alert_target)
            .json(context)
            .send()
            .await
            .map_err(|e| NotificationError::NotifyFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::NotifyFailed(format!(
                "webhook endpoint returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
