//! Notification transport boundary: the trait the alert emitter depends on,
//! plus webhook and stdout implementations and a router keyed on alert type.

pub mod error;
pub mod stdout;
pub mod traits;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use error::NotificationError;
use stdout::StdoutNotifier;
use traits::Notifier;
use webhook::WebhookNotifier;

/// Routes an alert to a transport based on its alert type.
///
/// Webhook alerts are delivered over HTTP; other alert types (email, sms)
/// are handed to the stdout notifier, which records the hand-off for the
/// external delivery pipeline.
pub struct NotificationRouter {
    webhook: Arc<WebhookNotifier>,
    fallback: Arc<StdoutNotifier>,
}

impl NotificationRouter {
    /// Creates a router over the given transports.
    pub fn new(webhook: WebhookNotifier, fallback: StdoutNotifier) -> Self {
        Self { webhook: Arc::new(webhook), fallback: Arc::new(fallback) }
    }
}

#[async_trait]
impl Notifier for NotificationRouter {
    async fn send(
        &self,
        alert_type: &str,
        alert_target: &str,
        context: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        if alert_type.eq_ignore_ascii_case("webhook") {
            self.webhook.send(alert_type, alert_target, context).await
        } else {
            self.fallback.send(alert_type, alert_target, context).await
        }
    }
}
