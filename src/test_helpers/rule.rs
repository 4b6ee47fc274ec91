//! Builder for `AlertRule` test fixtures.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::AlertRule;

/// Builds alert rules with sensible defaults for tests: enabled, matching
/// DENY actions, threshold 1 within 60s, 300s cooldown, priority 5.
#[derive(Debug)]
pub struct RuleBuilder {
    rule: AlertRule,
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBuilder {
    /// Creates a builder with default rule settings.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            rule: AlertRule {
                id: 0,
                name: "test-rule".to_string(),
                description: None,
                is_enabled: true,
                conditions: json!({"action": "DENY"}),
                alert_type: "email".to_string(),
                alert_target: "ops@example.com".to_string(),
                threshold_count: 1,
                threshold_period: 60,
                cooldown_period: 300,
                last_triggered: None,
                priority: 5,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Sets the rule id.
    pub fn id(mut self, id: i64) -> Self {
        self.rule.id = id;
        self
    }

    /// Sets the rule name.
    pub fn name(mut self, name: &str) -> Self {
        self.rule.name = name.to_string();
        self
    }

    /// Sets the enabled flag.
    pub fn is_enabled(mut self, enabled: bool) -> Self {
        self.rule.is_enabled = enabled;
        self
    }

    /// Sets the condition specification.
    pub fn conditions(mut self, conditions: serde_json::Value) -> Self {
        self.rule.conditions = conditions;
        self
    }

    /// Sets the alert type.
    pub fn alert_type(mut self, alert_type: &str) -> Self {
        self.rule.alert_type = alert_type.to_string();
        self
    }

    /// Sets the alert target.
    pub fn alert_target(mut self, alert_target: &str) -> Self {
        self.rule.alert_target = alert_target.to_string();
        self
    }

    /// Sets the threshold count.
    pub fn threshold_count(mut self, count: i64) -> Self {
        self.rule.threshold_count = count;
        self
    }

    /// Sets the threshold period in seconds.
    pub fn threshold_period(mut self, seconds: i64) -> Self {
        self.rule.threshold_period = seconds;
        self
    }

    /// Sets the cooldown period in seconds.
    pub fn cooldown_period(mut self, seconds: i64) -> Self {
        self.rule.cooldown_period = seconds;
        self
    }

    /// Sets the last-triggered timestamp.
    pub fn last_triggered(mut self, at: DateTime<Utc>) -> Self {
        self.rule.last_triggered = Some(at);
        self
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: i64) -> Self {
        self.rule.priority = priority;
        self
    }

    /// Finalizes the rule.
    pub fn build(self) -> AlertRule {
        self.rule
    }
}
