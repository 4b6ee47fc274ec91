//! Per-rule alert suppression based on last-trigger time.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Tracks the last firing time per rule and decides whether a rule may fire
/// again.
///
/// The in-memory record written by `mark_fired` is authoritative for the
/// remainder of the process lifetime: even if persisting `last_triggered`
/// fails downstream, the gate keeps suppressing duplicates. The persisted
/// timestamp seeds the decision for rules that have not fired in this process.
///
/// `can_fire` and `mark_fired` are individually cheap; callers serialize the
/// check-then-mark pair per rule (the pipeline's per-rule critical section).
#[derive(Debug, Default)]
pub struct CooldownGate {
    last_fired: DashMap<i64, DateTime<Utc>>,
}

impl CooldownGate {
    /// Creates an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff the rule has never fired or its cooldown has elapsed.
    ///
    /// `persisted_last` is the rule's stored `last_triggered` timestamp; the
    /// later of the persisted and in-memory records wins.
    pub fn can_fire(
        &self,
        rule_id: i64,
        persisted_last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool {
        let in_memory = self.last_fired.get(&rule_id).map(|entry| *entry.value());
        let last = match (in_memory, persisted_last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        match last {
            Some(last) => now - last >= cooldown,
            None => true,
        }
    }

    /// Records a firing decision for a rule.
    ///
    /// Records are kept for the process lifetime, including across a rule
    /// being disabled and re-enabled: if persisting `last_triggered` failed,
    /// this record is the only thing preventing a duplicate firing.
    pub fn mark_fired(&self, rule_id: i64, now: DateTime<Utc>) {
        self.last_fired.insert(rule_id, now);
    }
}
