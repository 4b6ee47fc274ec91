//! This module defines the `AlertTrigger` structure, the decision output that
//! a rule's threshold has been satisfied and an alert should be emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A firing decision produced by the evaluation pipeline and consumed by the
/// alert emitter. Created once per firing, then discarded after side effects
/// are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTrigger {
    /// Identifier of the rule that fired.
    pub rule_id: i64,

    /// Name of the rule that fired.
    pub rule_name: String,

    /// Alert delivery kind copied from the rule.
    pub alert_type: String,

    /// Alert delivery target copied from the rule.
    pub alert_target: String,

    /// Identifier of the event whose arrival satisfied the threshold.
    pub event_id: i64,

    /// Number of matches in the window at the moment of firing.
    pub matched_count: usize,

    /// The rule's configured threshold count.
    pub threshold_count: i64,

    /// Processing time at which the firing decision was made.
    pub triggered_at: DateTime<Utc>,
}

impl AlertTrigger {
    /// Builds the JSON context handed to the notification transport.
    pub fn context(&self) -> serde_json::Value {
        serde_json::json!({
            "rule_id": self.rule_id,
            "rule_name": self.rule_name,
            "event_id": self.event_id,
            "matched_count": self.matched_count,
            "threshold_count": self.threshold_count,
            "triggered_at": self.triggered_at,
        })
    }
}
