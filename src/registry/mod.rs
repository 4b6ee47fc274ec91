//! In-memory cache of alert rule definitions, refreshed from the rule storage
//! collaborator.
//!
//! The registry compiles rule condition specifications once per refresh and
//! publishes the result as an immutable snapshot behind an `ArcSwap`. Readers
//! (the evaluation pipeline) never block on a refresh in progress; a refresh
//! atomically swaps in a new snapshot so in-flight evaluations always see a
//! consistent rule set.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::{ArcSwap, Guard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    matcher::ConditionSet,
    models::AlertRule,
    storage::{error::StorageError, traits::RuleStore},
};

/// An enabled rule together with its compiled condition specification.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The rule definition as loaded from storage.
    pub rule: AlertRule,
    /// The validated, compiled condition specification.
    pub conditions: ConditionSet,
    /// Generation at which the rule most recently entered the enabled set.
    /// A change between snapshots means the rule was disabled and re-enabled
    /// in between, so its window state must restart empty.
    pub admitted_generation: u64,
}

/// An immutable snapshot of the enabled rule set, ordered for evaluation.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    rules: Vec<Arc<CompiledRule>>,
    rule_ids: HashSet<i64>,
    generation: u64,
}

impl RuleSnapshot {
    /// Enabled rules ordered by priority descending, ties broken by name
    /// ascending for deterministic evaluation order.
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    /// The identifiers of all rules in this snapshot.
    pub fn rule_ids(&self) -> &HashSet<i64> {
        &self.rule_ids
    }

    /// Monotonic counter incremented on every published snapshot, used by the
    /// pipeline to detect rule-set changes and prune per-rule state.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Caches enabled alert rules and keeps them fresh.
pub struct RuleRegistry {
    store: Arc<dyn RuleStore>,
    state: ArcSwap<RuleSnapshot>,
    refresh_interval: Duration,
    invalidation: Notify,
    generation: AtomicU64,
}

impl RuleRegistry {
    /// Creates a registry with an empty initial snapshot.
    pub fn new(store: Arc<dyn RuleStore>, refresh_interval: Duration) -> Self {
        Self {
            store,
            state: ArcSwap::new(Arc::new(RuleSnapshot::default())),
            refresh_interval,
            invalidation: Notify::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Loads the current snapshot. Never blocks on a refresh in progress.
    pub fn load(&self) -> Guard<Arc<RuleSnapshot>> {
        self.state.load()
    }

    /// Requests an out-of-band refresh, e.g. after a rule create or update.
    pub fn invalidate(&self) {
        self.invalidation.notify_one();
    }

    /// Performs the initial load. Unlike periodic refreshes, a failure here is
    /// propagated: the engine must not silently start with zero rules.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.refresh().await?;
        let snapshot = self.load();
        tracing::info!(rules = snapshot.rules().len(), "Rule registry initialized.");
        Ok(())
    }

    /// Fetches enabled rules from storage, compiles them, and atomically
    /// publishes a new snapshot.
    pub async fn refresh(&self) -> Result<(), StorageError> {
        let rules = self.store.list_enabled_rules().await?;
        let total = rules.len();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Rules carried over from the previous snapshot keep their admission
        // generation; rules entering (or re-entering) the enabled set are
        // stamped with the new one.
        let previous = self.load();
        let admissions: std::collections::HashMap<i64, u64> = previous
            .rules()
            .iter()
            .map(|c| (c.rule.id, c.admitted_generation))
            .collect();

        let mut compiled: Vec<Arc<CompiledRule>> = Vec::with_capacity(total);
        for rule in rules {
            if let Err(e) = rule.validate() {
                tracing::warn!(rule = %rule.name, error = %e, "Skipping rule with invalid thresholds.");
                continue;
            }
            match ConditionSet::parse(&rule.conditions) {
                Ok(conditions) => {
                    let admitted_generation =
                        admissions.get(&rule.id).copied().unwrap_or(generation);
                    compiled.push(Arc::new(CompiledRule {
                        rule,
                        conditions,
                        admitted_generation,
                    }));
                }
                Err(e) => {
                    tracing::warn!(rule = %rule.name, error = %e, "Skipping rule with invalid condition specification.");
                }
            }
        }

        compiled.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then_with(|| a.rule.name.cmp(&b.rule.name))
        });

        let rule_ids = compiled.iter().map(|c| c.rule.id).collect();

        tracing::debug!(
            loaded = compiled.len(),
            skipped = total - compiled.len(),
            generation,
            "Publishing new rule snapshot."
        );
        self.state.store(Arc::new(RuleSnapshot { rules: compiled, rule_ids, generation }));
        Ok(())
    }

    /// Long-running refresh loop: refreshes on the configured interval, on
    /// explicit invalidation, and stops on cancellation. A failed refresh
    /// retains the last good snapshot.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!("Rule registry cancellation signal received, shutting down...");
                    break;
                }

                _ = self.invalidation.notified() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "On-demand rule refresh failed; retaining last good snapshot.");
                    }
                }

                _ = tokio::time::sleep(self.refresh_interval) => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Periodic rule refresh failed; retaining last good snapshot.");
                    }
                }
            }
        }
        tracing::info!("Rule registry has shut down.");
    }
}
