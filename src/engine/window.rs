//! Per-rule sliding-window occurrence counting.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Counts matching events per rule over a trailing time window.
///
/// Each rule owns an ordered sequence of match timestamps. Eviction is always
/// anchored to processing time, not event time, so memory stays bounded no
/// matter how old a late-arriving event is. A configurable ceiling on window
/// length degrades counting lossily (oldest entries dropped) under extreme
/// event rates instead of growing without bound.
#[derive(Debug)]
pub struct WindowCounter {
    windows: DashMap<i64, VecDeque<DateTime<Utc>>>,
    ceiling: usize,
}

impl WindowCounter {
    /// Creates a counter with the given per-rule window length ceiling.
    pub fn new(ceiling: usize) -> Self {
        Self { windows: DashMap::new(), ceiling }
    }

    /// Records a match for a rule and returns the resulting in-window count,
    /// inclusive of the new entry.
    ///
    /// The timestamp is inserted in sorted position so out-of-order delivery
    /// is tolerated; entries older than `now - period` are then evicted.
    pub fn record_and_count(
        &self,
        rule_id: i64,
        event_timestamp: DateTime<Utc>,
        period: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let mut window = self.windows.entry(rule_id).or_default();

        // Common case: timestamps arrive in order and append at the back.
        match window.back() {
            Some(back) if *back > event_timestamp => {
                let pos = window.partition_point(|ts| *ts <= event_timestamp);
                window.insert(pos, event_timestamp);
            }
            _ => window.push_back(event_timestamp),
        }

        let horizon = now - period;
        while window.front().is_some_and(|ts| *ts < horizon) {
            window.pop_front();
        }

        if window.len() > self.ceiling {
            let excess = window.len() - self.ceiling;
            window.drain(..excess);
            tracing::warn!(
                rule_id,
                dropped = excess,
                ceiling = self.ceiling,
                "Window ceiling reached; dropped oldest entries. Counting fidelity is reduced."
            );
        }

        window.len()
    }

    /// Discards the window for a single rule.
    pub fn clear(&self, rule_id: i64) {
        self.windows.remove(&rule_id);
    }

    /// Discards windows for rules no longer in the enabled set.
    pub fn retain(&self, enabled_rule_ids: &HashSet<i64>) {
        self.windows.retain(|rule_id, _| enabled_rule_ids.contains(rule_id));
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_count_includes_new_entry() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(60);

        assert_eq!(counter.record_and_count(1, ts(10), period, ts(10)), 1);
        assert_eq!(counter.record_and_count(1, ts(20), period, ts(20)), 2);
        assert_eq!(counter.record_and_count(1, ts(30), period, ts(30)), 3);
    }

    #[test]
    fn test_entries_outside_period_are_evicted() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(60);

        counter.record_and_count(1, ts(0), period, ts(0));
        counter.record_and_count(1, ts(30), period, ts(30));
        // At t=70 the t=0 entry is older than the 60s window.
        assert_eq!(counter.record_and_count(1, ts(70), period, ts(70)), 2);
    }

    #[test]
    fn test_out_of_order_insertion_evicts_from_processing_time() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(50);

        // Events arrive t=100 then t=90, both evaluated at processing time
        // t=150. The t=90 entry is outside the window (150-90 > 50).
        counter.record_and_count(1, ts(100), period, ts(150));
        let count = counter.record_and_count(1, ts(90), period, ts(150));
        assert_eq!(count, 1);
    }

    #[test]
    fn test_late_event_inserted_in_sorted_position() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(100);

        counter.record_and_count(1, ts(10), period, ts(10));
        counter.record_and_count(1, ts(30), period, ts(30));
        // A late event between the two still counts while in window.
        assert_eq!(counter.record_and_count(1, ts(20), period, ts(30)), 3);
    }

    #[test]
    fn test_ceiling_drops_oldest_entries() {
        let counter = WindowCounter::new(3);
        let period = Duration::seconds(1000);

        for i in 0..5 {
            counter.record_and_count(1, ts(i), period, ts(i));
        }
        // Still within the period, but capped at the ceiling.
        assert_eq!(counter.record_and_count(1, ts(5), period, ts(5)), 3);
    }

    #[test]
    fn test_rules_have_independent_windows() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(60);

        assert_eq!(counter.record_and_count(1, ts(10), period, ts(10)), 1);
        assert_eq!(counter.record_and_count(2, ts(10), period, ts(10)), 1);
    }

    #[test]
    fn test_retain_discards_windows_of_removed_rules() {
        let counter = WindowCounter::new(100);
        let period = Duration::seconds(60);

        counter.record_and_count(1, ts(10), period, ts(10));
        counter.record_and_count(2, ts(10), period, ts(10));

        counter.retain(&HashSet::from([2]));

        // Rule 1 starts over with an empty window.
        assert_eq!(counter.record_and_count(1, ts(11), period, ts(11)), 1);
        assert_eq!(counter.record_and_count(2, ts(11), period, ts(11)), 2);
    }
}
