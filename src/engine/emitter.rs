//! The alert emitter: applies the side effects of a firing decision.
//!
//! Runs decoupled from the evaluation critical section so a slow or hung
//! notification transport cannot stall event ingestion.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    models::AlertTrigger, notification::traits::Notifier, storage::traits::RuleStore,
};

/// Persists firing decisions and hands them off to the notification
/// transport.
pub struct AlertEmitter {
    store: Arc<dyn RuleStore>,
    notifier: Arc<dyn Notifier>,
}

impl AlertEmitter {
    /// Creates a new emitter.
    pub fn new(store: Arc<dyn RuleStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Applies the side effects of one firing decision.
    ///
    /// Persisting `last_triggered` is best-effort: if the write fails, the
    /// in-memory cooldown state set at firing time keeps suppressing
    /// duplicates for the rest of the process lifetime. Notification failures
    /// are logged and never retried, preserving at-most-one-alert-per-cooldown
    /// semantics.
    pub async fn emit(&self, trigger: &AlertTrigger) {
        if let Err(e) =
            self.store.update_last_triggered(trigger.rule_id, trigger.triggered_at).await
        {
            tracing::error!(
                rule = %trigger.rule_name,
                error = %e,
                "Failed to persist last-triggered timestamp; in-memory cooldown state remains authoritative."
            );
        }

        match self
            .notifier
            .send(&trigger.alert_type, &trigger.alert_target, &trigger.context())
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    rule = %trigger.rule_name,
                    alert_type = %trigger.alert_type,
                    "Alert handed off to notification transport."
                );
            }
            Err(e) => {
                tracing::error!(
                    rule = %trigger.rule_name,
                    alert_type = %trigger.alert_type,
                    error = %e,
                    "Notification hand-off failed; firing decision is not retried."
                );
            }
        }
    }

    /// Long-running loop consuming triggers until the channel closes. The
    /// channel closes when the evaluation pipeline shuts down, so pending
    /// triggers drain naturally before exit.
    pub async fn run(self, mut triggers_rx: mpsc::Receiver<AlertTrigger>) {
        while let Some(trigger) = triggers_rx.recv().await {
            self.emit(&trigger).await;
        }
        tracing::info!("Alert emitter has shut down.");
    }
}
