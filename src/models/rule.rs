//! This module defines the `AlertRule` structure, a named, persistent
//! specification of event conditions plus alerting thresholds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error produced when an alert rule violates its threshold invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleValidationError {
    /// `threshold_count` must be at least 1.
    #[error("Rule '{rule_name}' has a non-positive threshold count: {value}")]
    InvalidThresholdCount {
        /// The name of the offending rule.
        rule_name: String,
        /// The rejected value.
        value: i64,
    },

    /// `threshold_period` must be at least 1 second.
    #[error("Rule '{rule_name}' has a non-positive threshold period: {value}s")]
    InvalidThresholdPeriod {
        /// The name of the offending rule.
        rule_name: String,
        /// The rejected value.
        value: i64,
    },

    /// `cooldown_period` must not be negative.
    #[error("Rule '{rule_name}' has a negative cooldown period: {value}s")]
    InvalidCooldownPeriod {
        /// The name of the offending rule.
        rule_name: String,
        /// The rejected value.
        value: i64,
    },

    /// `priority` must be between 1 and 10.
    #[error("Rule '{rule_name}' has an out-of-range priority: {value}")]
    InvalidPriority {
        /// The name of the offending rule.
        rule_name: String,
        /// The rejected value.
        value: i64,
    },
}

/// A persistent alert rule, owned by the rule storage collaborator and cached
/// in memory by the `RuleRegistry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Storage-assigned identifier.
    pub id: i64,

    /// Unique rule name.
    pub name: String,

    /// Optional operator-facing description.
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the rule participates in evaluation.
    pub is_enabled: bool,

    /// Condition specification: a mapping from event-field name to an accepted
    /// value or set of accepted values. Validated and compiled by the matcher
    /// when the rule is registered.
    pub conditions: serde_json::Value,

    /// Alert delivery kind (email/webhook/sms).
    pub alert_type: String,

    /// Alert delivery target (address, URL, or phone number).
    pub alert_target: String,

    /// Number of matching events required within the threshold period.
    pub threshold_count: i64,

    /// Sliding window length in seconds over which matches are counted.
    pub threshold_period: i64,

    /// Minimum number of seconds between two firings of this rule.
    pub cooldown_period: i64,

    /// Time the rule last fired, if ever.
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,

    /// Evaluation priority, 1-10, highest first.
    pub priority: i64,

    /// Timestamp when the rule was created.
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,

    /// Timestamp when the rule was last updated.
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Provides a default timestamp for serde deserialization.
fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

impl AlertRule {
    /// Checks the rule's threshold invariants.
    ///
    /// Rules are normally validated at creation time by the storage
    /// collaborator; this guards against legacy rows that predate validation.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.threshold_count < 1 {
            return Err(RuleValidationError::InvalidThresholdCount {
                rule_name: self.name.clone(),
                value: self.threshold_count,
            });
        }
        if self.threshold_period < 1 {
            return Err(RuleValidationError::InvalidThresholdPeriod {
                rule_name: self.name.clone(),
                value: self.threshold_period,
            });
        }
        if self.cooldown_period < 0 {
            return Err(RuleValidationError::InvalidCooldownPeriod {
                rule_name: self.name.clone(),
                value: self.cooldown_period,
            });
        }
        if !(1..=10).contains(&self.priority) {
            return Err(RuleValidationError::InvalidPriority {
                rule_name: self.name.clone(),
                value: self.priority,
            });
        }
        Ok(())
    }
}
