//! The per-event evaluation pipeline.
//!
//! For each incoming event the pipeline walks the enabled rule snapshot in
//! priority order: condition test, windowed count, threshold check, cooldown
//! decision. The count-check-and-cooldown step is a critical section per rule
//! identity, so two concurrent threshold-crossing evaluations of the same rule
//! cannot both fire; different rules evaluate fully in parallel.

use std::sync::{atomic::AtomicU64, atomic::Ordering, Arc};

use chrono::Duration;
use dashmap::{DashMap, DashSet};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{clock::Clock, cooldown::CooldownGate, window::WindowCounter},
    models::{AlertTrigger, FirewallEvent},
    registry::{CompiledRule, RuleRegistry, RuleSnapshot},
};

/// Errors that can occur while evaluating a single rule against an event.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The trigger channel to the alert emitter was closed.
    #[error("Trigger channel closed; alert for rule '{rule_name}' was dropped")]
    TriggerChannelClosed {
        /// The rule whose trigger could not be handed off.
        rule_name: String,
    },
}

/// Evaluates incoming firewall events against the enabled rule set.
pub struct EvaluationPipeline {
    /// Source of the enabled rule snapshot.
    registry: Arc<RuleRegistry>,

    /// Per-rule sliding-window match counters.
    windows: WindowCounter,

    /// Per-rule cooldown suppression state.
    cooldowns: CooldownGate,

    /// Rules whose threshold was satisfied while their cooldown was active.
    /// A hot rule fires on its first match after the cooldown expires, even
    /// if the window has drained in the meantime.
    hot_rules: DashSet<i64>,

    /// The admission generation for which each rule's window state was built.
    /// A mismatch against the current snapshot means the rule was disabled
    /// and re-enabled since, however many refreshes ago, and its window must
    /// restart empty.
    window_epochs: DashMap<i64, u64>,

    /// Per-rule locks serializing the count-check-and-cooldown decision.
    rule_locks: DashMap<i64, Arc<Mutex<()>>>,

    /// Hand-off channel to the alert emitter, decoupling notification I/O
    /// from the evaluation critical section.
    triggers_tx: mpsc::Sender<AlertTrigger>,

    /// Processing-time clock, injectable for tests.
    clock: Arc<dyn Clock>,

    /// Snapshot generation for which per-rule state was last pruned.
    pruned_generation: AtomicU64,
}

impl EvaluationPipeline {
    /// Creates a new pipeline.
    pub fn new(
        registry: Arc<RuleRegistry>,
        window_ceiling: usize,
        triggers_tx: mpsc::Sender<AlertTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            windows: WindowCounter::new(window_ceiling),
            cooldowns: CooldownGate::new(),
            hot_rules: DashSet::new(),
            window_epochs: DashMap::new(),
            rule_locks: DashMap::new(),
            triggers_tx,
            clock,
            pruned_generation: AtomicU64::new(0),
        }
    }

    /// Evaluates one event against every enabled rule in priority order.
    ///
    /// A failure while evaluating one rule is logged and skipped; it never
    /// blocks alerting for the remaining rules.
    pub async fn process_event(&self, event: &FirewallEvent) {
        let snapshot = self.registry.load();
        self.prune_stale_state(&snapshot);

        for compiled in snapshot.rules() {
            if !compiled.conditions.matches(event) {
                continue;
            }
            if let Err(e) = self.evaluate_matched_rule(compiled, event).await {
                tracing::error!(
                    rule = %compiled.rule.name,
                    event_id = event.id,
                    error = %e,
                    "Rule evaluation failed; continuing with remaining rules."
                );
            }
        }
    }

    /// Counts the match, checks the threshold, and makes the cooldown
    /// decision for a rule whose conditions matched, all under the rule's
    /// lock.
    async fn evaluate_matched_rule(
        &self,
        compiled: &CompiledRule,
        event: &FirewallEvent,
    ) -> Result<(), PipelineError> {
        let rule = &compiled.rule;
        let lock = self.rule_lock(rule.id);
        let _guard = lock.lock().await;

        // A rule that was disabled and re-enabled since this window was
        // built starts over with no retroactive counting. The cooldown
        // record is deliberately kept: it outlives disable/re-enable cycles
        // so a failed `last_triggered` write cannot re-open the gate.
        let epoch = compiled.admitted_generation;
        if self
            .window_epochs
            .insert(rule.id, epoch)
            .is_some_and(|previous| previous != epoch)
        {
            self.windows.clear(rule.id);
            self.hot_rules.remove(&rule.id);
        }

        let now = self.clock.now();
        let count = self.windows.record_and_count(
            rule.id,
            event.timestamp,
            Duration::seconds(rule.threshold_period),
            now,
        );

        let threshold_met = count >= rule.threshold_count as usize;
        if !threshold_met && !self.hot_rules.contains(&rule.id) {
            return Ok(());
        }

        let cooldown = Duration::seconds(rule.cooldown_period);
        if !self.cooldowns.can_fire(rule.id, rule.last_triggered, now, cooldown) {
            // The rule stays hot: the first match after the cooldown expires
            // fires immediately instead of rebuilding the count from zero.
            self.hot_rules.insert(rule.id);
            tracing::debug!(
                rule = %rule.name,
                event_id = event.id,
                "Threshold met but cooldown active; suppressing."
            );
            return Ok(());
        }

        self.hot_rules.remove(&rule.id);
        self.cooldowns.mark_fired(rule.id, now);

        let trigger = AlertTrigger {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            alert_type: rule.alert_type.clone(),
            alert_target: rule.alert_target.clone(),
            event_id: event.id,
            matched_count: count,
            threshold_count: rule.threshold_count,
            triggered_at: now,
        };

        tracing::info!(
            rule = %rule.name,
            event_id = event.id,
            matched_count = count,
            "Alert rule fired."
        );

        self.triggers_tx.send(trigger).await.map_err(|_| {
            PipelineError::TriggerChannelClosed { rule_name: rule.name.clone() }
        })
    }

    /// Gets or creates the lock serializing evaluation for a specific rule.
    fn rule_lock(&self, rule_id: i64) -> Arc<Mutex<()>> {
        self.rule_locks
            .entry(rule_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Releases window state and locks held for rules that left the enabled
    /// snapshot. This is memory hygiene only: correctness of the
    /// empty-window-on-re-enable property rests on the admission-generation
    /// check in `evaluate_matched_rule`. Cooldown records are never pruned;
    /// they are one timestamp per rule and must survive disable/re-enable.
    fn prune_stale_state(&self, snapshot: &RuleSnapshot) {
        let generation = snapshot.generation();
        if self.pruned_generation.swap(generation, Ordering::AcqRel) != generation {
            self.windows.retain(snapshot.rule_ids());
            self.hot_rules.retain(|rule_id| snapshot.rule_ids().contains(rule_id));
            self.window_epochs.retain(|rule_id, _| snapshot.rule_ids().contains(rule_id));
            self.rule_locks.retain(|rule_id, _| snapshot.rule_ids().contains(rule_id));
        }
    }

    /// Long-running loop consuming events from the ingestion channel.
    ///
    /// On cancellation, new event admission is refused but the in-flight
    /// event runs to completion, leaving no rule's cooldown state half
    /// updated. Dropping the pipeline closes the trigger channel, letting the
    /// alert emitter drain and shut down.
    pub async fn run(self, mut events_rx: mpsc::Receiver<FirewallEvent>, cancellation_token: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!("Evaluation pipeline cancellation signal received, refusing new events...");
                    break;
                }

                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.process_event(&event).await,
                        None => {
                            tracing::info!("Event channel closed, stopping evaluation pipeline.");
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("Evaluation pipeline has shut down.");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::{
        storage::traits::MockRuleStore,
        test_helpers::{EventBuilder, ManualClock, RuleBuilder},
    };

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Builds a pipeline over a registry seeded with the given rules.
    async fn pipeline_with_rules(
        rules: Vec<crate::models::AlertRule>,
        clock: Arc<ManualClock>,
    ) -> (EvaluationPipeline, mpsc::Receiver<AlertTrigger>) {
        let mut store = MockRuleStore::new();
        store.expect_list_enabled_rules().returning(move || Ok(rules.clone()));

        let registry = Arc::new(RuleRegistry::new(Arc::new(store), StdDuration::from_secs(30)));
        registry.refresh().await.unwrap();

        let (triggers_tx, triggers_rx) = mpsc::channel(16);
        let pipeline = EvaluationPipeline::new(registry, 100_000, triggers_tx, clock);
        (pipeline, triggers_rx)
    }

    #[tokio::test]
    async fn test_threshold_crossing_fires_once_and_respects_cooldown() {
        // Scenario: severity in {HIGH, CRITICAL}, 3 events within 60s fire
        // once; a 4th match during cooldown is suppressed but leaves the rule
        // hot; the first match after the cooldown expires fires immediately.
        let rule = RuleBuilder::new()
            .id(1)
            .name("severity-burst")
            .conditions(json!({"severity": ["HIGH", "CRITICAL"]}))
            .threshold_count(3)
            .threshold_period(60)
            .cooldown_period(300)
            .build();
        let clock = Arc::new(ManualClock::new(ts(0)));
        let (pipeline, mut triggers_rx) = pipeline_with_rules(vec![rule], clock.clone()).await;

        for i in 0..3 {
            clock.set(ts(i * 5));
            let event =
                EventBuilder::new().id(i).severity("HIGH").timestamp(ts(i * 5)).build();
            pipeline.process_event(&event).await;
        }

        let trigger = triggers_rx.try_recv().expect("third match should fire");
        assert_eq!(trigger.rule_name, "severity-burst");
        assert_eq!(trigger.matched_count, 3);
        assert_eq!(trigger.event_id, 2);

        // A 4th matching event 10s later: threshold still met, cooldown active.
        clock.set(ts(20));
        pipeline
            .process_event(&EventBuilder::new().id(3).severity("CRITICAL").timestamp(ts(20)).build())
            .await;
        assert!(triggers_rx.try_recv().is_err());

        // A 5th match at t=310: 300s after the firing at t=10, the cooldown
        // has expired and the still-hot rule fires without rebuilding the
        // count from zero.
        clock.set(ts(310));
        pipeline
            .process_event(&EventBuilder::new().id(4).severity("HIGH").timestamp(ts(310)).build())
            .await;
        let trigger = triggers_rx.try_recv().expect("post-cooldown match should fire");
        assert_eq!(trigger.event_id, 4);
    }

    #[tokio::test]
    async fn test_non_matching_events_do_not_count() {
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(2)
            .threshold_period(60)
            .build();
        let clock = Arc::new(ManualClock::new(ts(0)));
        let (pipeline, mut triggers_rx) = pipeline_with_rules(vec![rule], clock.clone()).await;

        pipeline
            .process_event(&EventBuilder::new().id(1).action("ALLOW").timestamp(ts(1)).build())
            .await;
        pipeline
            .process_event(&EventBuilder::new().id(2).action("DENY").timestamp(ts(2)).build())
            .await;
        assert!(triggers_rx.try_recv().is_err());

        pipeline
            .process_event(&EventBuilder::new().id(3).action("DENY").timestamp(ts(3)).build())
            .await;
        assert!(triggers_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_threshold_one_zero_cooldown_fires_every_match() {
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(1)
            .threshold_period(60)
            .cooldown_period(0)
            .build();
        let clock = Arc::new(ManualClock::new(ts(0)));
        let (pipeline, mut triggers_rx) = pipeline_with_rules(vec![rule], clock.clone()).await;

        for i in 0..3 {
            clock.set(ts(i));
            pipeline
                .process_event(&EventBuilder::new().id(i).action("deny").timestamp(ts(i)).build())
                .await;
            assert!(triggers_rx.try_recv().is_ok(), "match {i} should fire");
        }
    }

    #[tokio::test]
    async fn test_out_of_order_event_does_not_resurrect_expired_window() {
        // Events at t=100 then t=90, threshold_period=50, processed at t=150:
        // only the t=100 entry survives eviction, so a 2-count rule must not
        // fire.
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(2)
            .threshold_period(50)
            .build();
        let clock = Arc::new(ManualClock::new(ts(150)));
        let (pipeline, mut triggers_rx) = pipeline_with_rules(vec![rule], clock.clone()).await;

        pipeline
            .process_event(&EventBuilder::new().id(1).action("DENY").timestamp(ts(100)).build())
            .await;
        pipeline
            .process_event(&EventBuilder::new().id(2).action("DENY").timestamp(ts(90)).build())
            .await;
        assert!(triggers_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_higher_priority_rule_evaluates_first() {
        let low = RuleBuilder::new()
            .id(1)
            .name("low")
            .priority(2)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(1)
            .cooldown_period(0)
            .build();
        let high = RuleBuilder::new()
            .id(2)
            .name("high")
            .priority(9)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(1)
            .cooldown_period(0)
            .build();
        let clock = Arc::new(ManualClock::new(ts(0)));
        let (pipeline, mut triggers_rx) =
            pipeline_with_rules(vec![low, high], clock.clone()).await;

        pipeline
            .process_event(&EventBuilder::new().id(1).action("DENY").timestamp(ts(0)).build())
            .await;

        let first = triggers_rx.try_recv().unwrap();
        let second = triggers_rx.try_recv().unwrap();
        assert_eq!(first.rule_name, "high");
        assert_eq!(second.rule_name, "low");
    }

    #[tokio::test]
    async fn test_concurrent_submission_fires_at_most_once_per_cooldown() {
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(3)
            .threshold_period(600)
            .cooldown_period(300)
            .build();
        let clock = Arc::new(ManualClock::new(ts(100)));
        let (pipeline, mut triggers_rx) = pipeline_with_rules(vec![rule], clock.clone()).await;
        let pipeline = Arc::new(pipeline);

        // 32 threshold-crossing events submitted concurrently.
        let mut handles = Vec::new();
        for i in 0..32 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                let event =
                    EventBuilder::new().id(i).action("DENY").timestamp(ts(100)).build();
                pipeline.process_event(&event).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut fired = 0;
        while triggers_rx.try_recv().is_ok() {
            fired += 1;
        }
        assert_eq!(fired, 1, "exactly one trigger per cooldown window");
    }

    #[tokio::test]
    async fn test_rule_removed_from_snapshot_restarts_with_empty_window() {
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(2)
            .threshold_period(600)
            .build();

        let mut store = MockRuleStore::new();
        let mut call = 0;
        let rule_clone = rule.clone();
        store.expect_list_enabled_rules().returning(move || {
            call += 1;
            match call {
                // Present, then disabled (absent), then re-enabled.
                1 | 3 => Ok(vec![rule_clone.clone()]),
                _ => Ok(vec![]),
            }
        });

        let registry = Arc::new(RuleRegistry::new(Arc::new(store), StdDuration::from_secs(30)));
        let (triggers_tx, mut triggers_rx) = mpsc::channel(16);
        let clock = Arc::new(ManualClock::new(ts(0)));
        let pipeline = EvaluationPipeline::new(registry.clone(), 100_000, triggers_tx, clock);

        registry.refresh().await.unwrap();
        pipeline
            .process_event(&EventBuilder::new().id(1).action("DENY").timestamp(ts(1)).build())
            .await;

        // Disable, then re-enable: the first match counted before the disable
        // must not carry over.
        registry.refresh().await.unwrap();
        pipeline
            .process_event(&EventBuilder::new().id(2).action("DENY").timestamp(ts(2)).build())
            .await;
        registry.refresh().await.unwrap();
        pipeline
            .process_event(&EventBuilder::new().id(3).action("DENY").timestamp(ts(3)).build())
            .await;
        assert!(triggers_rx.try_recv().is_err(), "window must restart empty");

        pipeline
            .process_event(&EventBuilder::new().id(4).action("DENY").timestamp(ts(4)).build())
            .await;
        assert!(triggers_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_reenabled_rule_discards_window_even_without_intervening_events() {
        // The disable and re-enable both happen while no events flow, so the
        // pipeline only ever observes the final snapshot. Matches counted
        // before the disable must still not carry over.
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(3)
            .threshold_period(600)
            .build();

        let mut store = MockRuleStore::new();
        let mut call = 0;
        let rule_clone = rule.clone();
        store.expect_list_enabled_rules().returning(move || {
            call += 1;
            match call {
                1 | 3 => Ok(vec![rule_clone.clone()]),
                _ => Ok(vec![]),
            }
        });

        let registry = Arc::new(RuleRegistry::new(Arc::new(store), StdDuration::from_secs(30)));
        let (triggers_tx, mut triggers_rx) = mpsc::channel(16);
        let clock = Arc::new(ManualClock::new(ts(0)));
        let pipeline = EvaluationPipeline::new(registry.clone(), 100_000, triggers_tx, clock);

        registry.refresh().await.unwrap();
        pipeline
            .process_event(&EventBuilder::new().id(1).action("DENY").timestamp(ts(1)).build())
            .await;
        pipeline
            .process_event(&EventBuilder::new().id(2).action("DENY").timestamp(ts(2)).build())
            .await;

        // Disabled, then re-enabled, with no events in between.
        registry.refresh().await.unwrap();
        registry.refresh().await.unwrap();

        pipeline
            .process_event(&EventBuilder::new().id(3).action("DENY").timestamp(ts(3)).build())
            .await;
        assert!(
            triggers_rx.try_recv().is_err(),
            "pre-disable matches must not complete the threshold"
        );

        // The restarted window needs three fresh matches to fire.
        pipeline
            .process_event(&EventBuilder::new().id(4).action("DENY").timestamp(ts(4)).build())
            .await;
        assert!(triggers_rx.try_recv().is_err());
        pipeline
            .process_event(&EventBuilder::new().id(5).action("DENY").timestamp(ts(5)).build())
            .await;
        assert!(triggers_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_cooldown_record_survives_disable_and_reenable() {
        // The rule fires but its `last_triggered` is never persisted (the
        // store keeps returning None). After a disable/re-enable cycle the
        // in-memory record must still suppress a second firing.
        let rule = RuleBuilder::new()
            .id(1)
            .conditions(json!({"action": "DENY"}))
            .threshold_count(1)
            .threshold_period(60)
            .cooldown_period(300)
            .build();

        let mut store = MockRuleStore::new();
        let mut call = 0;
        let rule_clone = rule.clone();
        store.expect_list_enabled_rules().returning(move || {
            call += 1;
            match call {
                1 | 3 => Ok(vec![rule_clone.clone()]),
                _ => Ok(vec![]),
            }
        });

        let registry = Arc::new(RuleRegistry::new(Arc::new(store), StdDuration::from_secs(30)));
        let (triggers_tx, mut triggers_rx) = mpsc::channel(16);
        let clock = Arc::new(ManualClock::new(ts(0)));
        let pipeline = EvaluationPipeline::new(registry.clone(), 100_000, triggers_tx, clock.clone());

        registry.refresh().await.unwrap();
        pipeline
            .process_event(&EventBuilder::new().id(1).action("DENY").timestamp(ts(0)).build())
            .await;
        assert!(triggers_rx.try_recv().is_ok());

        registry.refresh().await.unwrap();
        registry.refresh().await.unwrap();

        clock.set(ts(10));
        pipeline
            .process_event(&EventBuilder::new().id(2).action("DENY").timestamp(ts(10)).build())
            .await;
        assert!(
            triggers_rx.try_recv().is_err(),
            "cooldown from the first firing must still apply"
        );

        // Past the cooldown the rule may fire again.
        clock.set(ts(310));
        pipeline
            .process_event(&EventBuilder::new().id(3).action("DENY").timestamp(ts(310)).build())
            .await;
        assert!(triggers_rx.try_recv().is_ok());
    }
}
