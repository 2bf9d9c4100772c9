//! Snapshot differ: turns two consecutive counter snapshots into observations.
//!
//! Byte counters become per-second rates over the collection period; every
//! other counter is reported as the plain delta since the previous tick.
//! The very first snapshot only establishes a baseline and yields nothing.

use std::collections::HashMap;

use crate::mib::{CounterKind, Direction};
use crate::model::{Batch, MetricValue, Observation, Snapshot};

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Elapsed magnitude between two readings of a counter that wraps at `ceiling`.
///
/// A decrease is read as exactly one wrap past the ceiling, so a counter that
/// went down by one step reports a near-ceiling delta. Multiple wraps between
/// polls cannot be detected. Out-of-range inputs wrap instead of panicking.
pub fn counter_delta(prev: u64, curr: u64, ceiling: u64) -> u64 {
    if curr >= prev {
        curr - prev
    } else {
        ceiling.wrapping_sub(prev).wrapping_add(curr)
    }
}

/// Makes an interface label safe to embed in a dotted metric name.
pub fn sanitize_interface_name(label: &str) -> String {
    label.replace('/', "-").replace('.', "_").replace(' ', "")
}

/// Metric name for a counter on an interface.
pub fn metric_name(kind: CounterKind, if_name: &str) -> String {
    let if_name = sanitize_interface_name(if_name);
    if kind.is_rate() {
        let direction = match kind.direction() {
            Direction::Receive => "rxBytes",
            Direction::Transmit => "txBytes",
        };
        format!("interface.{}.{}.delta", if_name, direction)
    } else {
        format!("custom.interface.{}.{}", kind, if_name)
    }
}

// ---------------------------------------------------------------------------
// Snapshot diff
// ---------------------------------------------------------------------------

/// Normalizes `current` against `previous`.
///
/// Returns an empty batch when `previous` is empty. A sample with no
/// counterpart in `previous` yields a zero delta. Rates use truncating
/// integer division by `period_secs`.
pub fn diff_snapshots(
    previous: &Snapshot,
    current: &Snapshot,
    period_secs: u64,
    time: i64,
) -> Batch {
    if previous.is_empty() {
        return Batch::new();
    }

    let prev_values: HashMap<(u64, CounterKind), u64> = previous
        .samples
        .iter()
        .map(|s| ((s.if_index, s.kind), s.value))
        .collect();
    let period_secs = period_secs.max(1);

    current
        .samples
        .iter()
        .map(|sample| {
            let prev = prev_values
                .get(&(sample.if_index, sample.kind))
                .copied()
                .unwrap_or(sample.value);
            let mut value = counter_delta(prev, sample.value, sample.kind.overflow_ceiling());
            if sample.kind.is_rate() {
                value /= period_secs;
            }
            Observation::new(
                metric_name(sample.kind, &sample.if_name),
                time,
                MetricValue::Integer(value),
            )
        })
        .collect()
}

/// Differ state: the previous snapshot, owned by the collection loop.
#[derive(Debug)]
pub struct SnapshotDiffer {
    previous: Option<Snapshot>,
    period_secs: u64,
}

impl SnapshotDiffer {
    pub fn new(period_secs: u64) -> Self {
        Self {
            previous: None,
            period_secs,
        }
    }

    /// Diffs `current` against the stored snapshot, then makes it the new baseline.
    pub fn advance(&mut self, current: Snapshot, time: i64) -> Batch {
        let batch = match &self.previous {
            Some(previous) => diff_snapshots(previous, &current, self.period_secs, time),
            None => Batch::new(),
        };
        self.previous = Some(current);
        batch
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }
}
