//! The notification contract the alert emitter consumes.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::notification::error::NotificationError;

/// The notification transport collaborator. Invoked fire-and-forget from the
/// emitter's perspective: delivery guarantees belong to the transport.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hands an alert with its trigger context to the transport.
    async fn send(
        &self,
        alert_type: &str,
        alert_target: &str,
        context: &serde_json::Value,
    ) -> Result<(), NotificationError>;
}
