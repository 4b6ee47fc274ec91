//! The storage contract the evaluation engine consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{models::AlertRule, storage::error::StorageError};

/// The rule storage collaborator. The engine only depends on this contract;
/// schema ownership and rule CRUD belong to the collaborator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Lists all enabled alert rules.
    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>, StorageError>;

    /// Records the time a rule last fired.
    async fn update_last_triggered(
        &self,
        rule_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
