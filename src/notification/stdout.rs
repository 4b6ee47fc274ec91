//! Stdout notification transport.
//!
//! Email and SMS delivery are external collaborator concerns; this notifier
//! records the hand-off so the delivery pipeline (or an operator) can pick it
//! up from the process output.

use async_trait::async_trait;

use crate::notification::{error::NotificationError, traits::Notifier};

/// Prints the alert hand-off to standard output.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

impl StdoutNotifier {
    /// Creates a new stdout notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(
        &self,
        alert_type: &str,
        alert_target: &str,
        context: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        println!("=== Alert ({alert_type}) -> {alert_target} ===\n{context}\n");
        Ok(())
    }
}
