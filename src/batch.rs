//! Batch accumulation and flush scheduling
//!
//! Measurements merge in memory keyed by (step, phase) until a flush
//! interval fires. One (step, phase) pair occupies exactly one pending
//! row no matter how many times it is traced; later cells overwrite
//! earlier ones and refresh the row's ingestion time.

use std::collections::BTreeMap;
use std::mem;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::store::Row;
use crate::value::Value;

/// Cells accumulated for one (step, phase) pair.
#[derive(Debug, Clone)]
struct PendingRow {
    time: DateTime<Utc>,
    values: BTreeMap<String, Value>,
}

/// Buffer of unflushed measurements, keyed by step then phase.
///
/// `BTreeMap` keeps drain order deterministic: ascending step, phases
/// in lexicographic order within a step.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    entries: BTreeMap<u32, BTreeMap<String, PendingRow>>,
}

impl PendingBatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Merges cells into the (step, phase) row. Last write wins, and a
    /// merge refreshes the row's ingestion time.
    pub(crate) fn merge(
        &mut self,
        step: u32,
        phase: &str,
        values: impl IntoIterator<Item = (String, Value)>,
        time: DateTime<Utc>,
    ) {
        let row = self
            .entries
            .entry(step)
            .or_default()
            .entry(phase.to_string())
            .or_insert_with(|| PendingRow {
                time,
                values: BTreeMap::new(),
            });
        row.time = time;
        row.values.extend(values);
    }

    /// Number of distinct (step, phase) rows currently buffered.
    pub(crate) fn row_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains the buffer into store rows, ascending step then phase.
    pub(crate) fn take_rows(&mut self) -> Vec<Row> {
        let entries = mem::take(&mut self.entries);
        let mut rows = Vec::new();
        for (step, phases) in entries {
            for (phase, pending) in phases {
                let mut row = Row::new(step, phase).with_time(pending.time);
                for (column, value) in pending.values {
                    row.set(column, value);
                }
                rows.push(row);
            }
        }
        rows
    }

    /// Puts rows back after a failed flush.
    ///
    /// Restored cells only fill gaps: if a (step, phase) row was merged
    /// again in the meantime, the newer cells and time stay.
    pub(crate) fn restore(&mut self, rows: Vec<Row>) {
        for row in rows {
            let (step, phase, time, values) = row.into_parts();
            let phases = self.entries.entry(step).or_default();
            match phases.entry(phase) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(PendingRow {
                        time: time.unwrap_or_else(Utc::now),
                        values,
                    });
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let newer = slot.get_mut();
                    for (column, value) in values {
                        newer.values.entry(column).or_insert(value);
                    }
                }
            }
        }
    }
}

/// When to flush: after a step distance, after elapsed wall time, or
/// whichever of the two fires first when both are set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlushPolicy {
    pub(crate) step_interval: Option<u32>,
    pub(crate) time_interval: Option<Duration>,
}

impl FlushPolicy {
    /// Whether any interval is configured at all.
    pub(crate) const fn enabled(&self) -> bool {
        self.step_interval.is_some() || self.time_interval.is_some()
    }

    /// Whether a measurement at `step` must flush the buffer first.
    ///
    /// Steps that move backwards never fire the step interval; the
    /// distance saturates at zero.
    pub(crate) fn is_due(&self, step: u32, last_step: u32, last_flush: Instant) -> bool {
        let step_due = self
            .step_interval
            .is_some_and(|interval| step.saturating_sub(last_step) >= interval);
        let time_due = self
            .time_interval
            .is_some_and(|interval| last_flush.elapsed() >= interval);
        step_due || time_due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    fn float(value: f32) -> Value {
        Value::Scalar(Scalar::Float(value))
    }

    #[test]
    fn distinct_phases_keep_distinct_rows() {
        let mut batch = PendingBatch::new();
        let now = Utc::now();
        batch.merge(0, "train", [("loss".to_string(), float(0.9))], now);
        batch.merge(0, "val", [("loss".to_string(), float(0.7))], now);
        assert_eq!(batch.row_count(), 2);
    }

    #[test]
    fn same_step_and_phase_merge_into_one_row() {
        let mut batch = PendingBatch::new();
        let early = Utc::now() - chrono::Duration::seconds(10);
        let late = Utc::now();
        batch.merge(1, "train", [("loss".to_string(), float(0.9))], early);
        batch.merge(
            1,
            "train",
            [
                ("loss".to_string(), float(0.5)),
                ("accuracy".to_string(), float(0.8)),
            ],
            late,
        );
        assert_eq!(batch.row_count(), 1);

        let rows = batch.take_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("loss"), Some(&float(0.5)));
        assert_eq!(rows[0].get("accuracy"), Some(&float(0.8)));
        assert_eq!(rows[0].time(), Some(late));
    }

    #[test]
    fn take_rows_orders_by_step_then_phase_and_drains() {
        let mut batch = PendingBatch::new();
        let now = Utc::now();
        batch.merge(5, "val", [("loss".to_string(), float(0.1))], now);
        batch.merge(2, "train", [("loss".to_string(), float(0.3))], now);
        batch.merge(5, "train", [("loss".to_string(), float(0.2))], now);

        let rows = batch.take_rows();
        let order: Vec<(u32, String)> = rows
            .iter()
            .map(|r| (r.step(), r.phase().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (2, "train".to_string()),
                (5, "train".to_string()),
                (5, "val".to_string()),
            ]
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn restore_refills_empty_buffer() {
        let mut batch = PendingBatch::new();
        batch.merge(3, "train", [("loss".to_string(), float(0.4))], Utc::now());
        let rows = batch.take_rows();
        assert!(batch.is_empty());

        batch.restore(rows);
        assert_eq!(batch.row_count(), 1);
        let rows = batch.take_rows();
        assert_eq!(rows[0].get("loss"), Some(&float(0.4)));
    }

    #[test]
    fn restore_never_clobbers_newer_cells() {
        let mut batch = PendingBatch::new();
        let old_time = Utc::now() - chrono::Duration::seconds(30);
        batch.merge(4, "train", [("loss".to_string(), float(0.9))], old_time);
        let taken = batch.take_rows();

        let new_time = Utc::now();
        batch.merge(
            4,
            "train",
            [("accuracy".to_string(), float(0.6))],
            new_time,
        );
        batch.restore(taken);

        let rows = batch.take_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("loss"), Some(&float(0.9)));
        assert_eq!(rows[0].get("accuracy"), Some(&float(0.6)));
        assert_eq!(rows[0].time(), Some(new_time));
    }

    #[test]
    fn step_interval_fires_at_exact_distance() {
        let policy = FlushPolicy {
            step_interval: Some(2),
            time_interval: None,
        };
        let last_flush = Instant::now();
        assert!(!policy.is_due(1, 0, last_flush));
        assert!(policy.is_due(2, 0, last_flush));
        assert!(policy.is_due(7, 0, last_flush));
    }

    #[test]
    fn backwards_steps_saturate() {
        let policy = FlushPolicy {
            step_interval: Some(1),
            time_interval: None,
        };
        assert!(!policy.is_due(3, 10, Instant::now()));
    }

    #[test]
    fn zero_time_interval_is_always_due() {
        let policy = FlushPolicy {
            step_interval: None,
            time_interval: Some(Duration::ZERO),
        };
        assert!(policy.is_due(0, 0, Instant::now()));
    }

    #[test]
    fn unset_intervals_never_fire() {
        let policy = FlushPolicy {
            step_interval: None,
            time_interval: None,
        };
        assert!(!policy.enabled());
        assert!(!policy.is_due(u32::MAX, 0, Instant::now()));
    }

    // Property-based tests (EXTREME TDD - Toyota Way: Jidoka)
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: row count equals the number of distinct (step, phase) pairs
            #[test]
            fn prop_row_count_tracks_distinct_pairs(
                pairs in prop::collection::vec((0u32..20, "[a-z]{1,4}"), 1..50)
            ) {
                let mut batch = PendingBatch::new();
                for (step, phase) in &pairs {
                    batch.merge(*step, phase, [("loss".to_string(), float(0.5))], Utc::now());
                }
                let distinct: std::collections::BTreeSet<_> = pairs.iter().cloned().collect();
                prop_assert_eq!(batch.row_count(), distinct.len());
            }

            /// Property: take_rows drains every buffered row exactly once
            #[test]
            fn prop_take_rows_drains_everything(
                pairs in prop::collection::vec((0u32..20, "[a-z]{1,4}"), 1..50)
            ) {
                let mut batch = PendingBatch::new();
                for (step, phase) in &pairs {
                    batch.merge(*step, phase, [("loss".to_string(), float(0.5))], Utc::now());
                }
                let buffered = batch.row_count();
                let rows = batch.take_rows();
                prop_assert_eq!(rows.len(), buffered);
                prop_assert!(batch.is_empty());
            }

            /// Property: restoring a take into an untouched buffer is lossless
            #[test]
            fn prop_restore_round_trips(
                pairs in prop::collection::vec((0u32..20, "[a-z]{1,4}"), 1..50)
            ) {
                let mut batch = PendingBatch::new();
                for (step, phase) in &pairs {
                    batch.merge(*step, phase, [("loss".to_string(), float(0.5))], Utc::now());
                }
                let before = batch.row_count();
                let rows = batch.take_rows();
                batch.restore(rows);
                prop_assert_eq!(batch.row_count(), before);
            }
        }
    }
}
