//! SQLite-backed implementation of the `RuleStore` contract.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    FromRow,
};

use crate::{
    models::AlertRule,
    storage::{error::StorageError, traits::RuleStore},
};

/// A rule store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRuleStore {
    pool: SqlitePool,
}

/// Raw row shape for `alert_rules`; the conditions column is JSON text.
#[derive(Debug, FromRow)]
struct AlertRuleRow {
    id: i64,
    name: String,
    description: Option<String>,
    is_enabled: bool,
    conditions: String,
    alert_type: String,
    alert_target: String,
    threshold_count: i64,
    threshold_period: i64,
    cooldown_period: i64,
    last_triggered: Option<DateTime<Utc>>,
    priority: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AlertRuleRow {
    fn into_rule(self) -> Result<AlertRule, StorageError> {
        let conditions = serde_json::from_str(&self.conditions).map_err(|e| {
            StorageError::Decode(format!("rule '{}': invalid conditions JSON: {e}", self.name))
        })?;
        Ok(AlertRule {
            id: self.id,
            name: self.name,
            description: self.description,
            is_enabled: self.is_enabled,
            conditions,
            alert_type: self.alert_type,
            alert_target: self.alert_target,
            threshold_count: self.threshold_count,
            threshold_period: self.threshold_period,
            cooldown_period: self.cooldown_period,
            last_triggered: self.last_triggered,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl SqliteRuleStore {
    /// Connects to the database at the given URL, creating the file if
    /// needed.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let options =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Creates the `alert_rules` table if it does not exist.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alert_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                conditions TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                alert_target TEXT NOT NULL,
                threshold_count INTEGER NOT NULL DEFAULT 1,
                threshold_period INTEGER NOT NULL DEFAULT 60,
                cooldown_period INTEGER NOT NULL DEFAULT 300,
                last_triggered TEXT,
                priority INTEGER NOT NULL DEFAULT 5,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Inserts a rule and returns its assigned id. Used by seeding and tests;
    /// rule CRUD otherwise belongs to the administration collaborator.
    pub async fn insert_rule(&self, rule: &AlertRule) -> Result<i64, StorageError> {
        let conditions = serde_json::to_string(&rule.conditions)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        let result = sqlx::query(
            r#"
            INSERT INTO alert_rules (
                name, description, is_enabled, conditions, alert_type, alert_target,
                threshold_count, threshold_period, cooldown_period, last_triggered,
                priority, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.is_enabled)
        .bind(conditions)
        .bind(&rule.alert_type)
        .bind(&rule.alert_target)
        .bind(rule.threshold_count)
        .bind(rule.threshold_period)
        .bind(rule.cooldown_period)
        .bind(rule.last_triggered)
        .bind(rule.priority)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Enables or disables a rule.
    pub async fn set_enabled(&self, rule_id: i64, enabled: bool) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE alert_rules SET is_enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(enabled)
        .bind(Utc::now())
        .bind(rule_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("rule id {rule_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>, StorageError> {
        let rows = sqlx::query_as::<_, AlertRuleRow>(
            "SELECT * FROM alert_rules WHERE is_enabled = 1 ORDER BY priority DESC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    // Legacy rows with undecodable conditions are skipped, not
                    // allowed to take the whole rule set down.
                    tracing::warn!(error = %e, "Skipping undecodable alert rule row.");
                }
            }
        }
        Ok(rules)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn update_last_triggered(
        &self,
        rule_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE alert_rules SET last_triggered = ?, updated_at = ? WHERE id = ?",
        )
        .bind(timestamp)
        .bind(Utc::now())
        .bind(rule_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("rule id {rule_id}")));
        }
        Ok(())
    }
}
