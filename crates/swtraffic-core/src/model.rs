//! Data structures flowing through the pipeline.
//!
//! Raw [`CounterSample`]s are grouped into a [`Snapshot`] per collection tick.
//! The differ turns two snapshots into a [`Batch`] of [`Observation`]s, which
//! is the only thing the delivery queue ever sees.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mib::CounterKind;

/// One raw counter reading for one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub if_index: u64,
    pub kind: CounterKind,
    pub if_name: String,
    pub value: u64,
}

impl fmt::Display for CounterSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.if_index, self.if_name, self.kind, self.value
        )
    }
}

/// All samples collected in one tick, unique by `(if_index, kind)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub samples: Vec<CounterSample>,
}

impl Snapshot {
    pub fn new(samples: Vec<CounterSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Looks up the sample for an interface and counter.
    pub fn get(&self, if_index: u64, kind: CounterKind) -> Option<&CounterSample> {
        self.samples
            .iter()
            .find(|s| s.if_index == if_index && s.kind == kind)
    }
}

/// Numeric payload of an observation.
///
/// Serialized as a bare JSON number so the API sees integers and floats alike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(u64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A named, timestamped value ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    /// Unix timestamp (seconds).
    pub time: i64,
    pub value: MetricValue,
}

impl Observation {
    pub fn new(name: impl Into<String>, time: i64, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            time,
            value,
        }
    }
}

/// Observations produced by one collection tick, the unit of queueing.
pub type Batch = Vec<Observation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lookup_by_index_and_kind() {
        let snapshot = Snapshot::new(vec![
            CounterSample {
                if_index: 1,
                kind: CounterKind::HcInOctets,
                if_name: "eth0".to_string(),
                value: 10,
            },
            CounterSample {
                if_index: 1,
                kind: CounterKind::HcOutOctets,
                if_name: "eth0".to_string(),
                value: 20,
            },
        ]);
        assert_eq!(
            snapshot.get(1, CounterKind::HcOutOctets).map(|s| s.value),
            Some(20)
        );
        assert!(snapshot.get(2, CounterKind::HcOutOctets).is_none());
        assert!(snapshot.get(1, CounterKind::InErrors).is_none());
    }

    #[test]
    fn sample_display_is_tab_separated() {
        let sample = CounterSample {
            if_index: 3,
            kind: CounterKind::InErrors,
            if_name: "ge-0/0/1".to_string(),
            value: 42,
        };
        assert_eq!(sample.to_string(), "3\tge-0/0/1\tifInErrors\t42");
    }

    #[test]
    fn metric_value_serializes_as_bare_number() {
        let obs = Observation::new("a.b", 100, MetricValue::Integer(7));
        assert_eq!(
            serde_json::to_string(&obs).unwrap(),
            r#"{"name":"a.b","time":100,"value":7}"#
        );
        let obs = Observation::new("c", 1, MetricValue::Float(1.5));
        assert_eq!(
            serde_json::to_string(&obs).unwrap(),
            r#"{"name":"c","time":1,"value":1.5}"#
        );
    }
}
