//! Pass-through conversion of custom OID readings.
//!
//! Custom OIDs are gauges: their values go out as-is, named by the metric
//! names configured for them.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Batch, MetricValue, Observation};

/// Maps configured metric names to the OIDs they are read from.
#[derive(Debug, Clone, Default)]
pub struct CustomConverter {
    /// metric name -> OID
    mapping: BTreeMap<String, String>,
}

impl CustomConverter {
    pub fn new(mapping: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            mapping: mapping.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// OIDs to poll, deduplicated and sorted.
    pub fn oids(&self) -> Vec<String> {
        let mut oids: Vec<String> = self.mapping.values().cloned().collect();
        oids.sort();
        oids.dedup();
        oids
    }

    /// One observation per metric whose OID returned a value, in name order.
    pub fn convert(&self, values: &HashMap<String, f64>, time: i64) -> Batch {
        self.mapping
            .iter()
            .filter_map(|(name, oid)| {
                values
                    .get(oid)
                    .map(|v| Observation::new(name.clone(), time, MetricValue::Float(*v)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_skips_missing_oids() {
        let converter = CustomConverter::new([
            ("custom.custommibs.x.temp".to_string(), "1.2.3.4".to_string()),
            ("custom.custommibs.x.fan".to_string(), "1.2.3.5".to_string()),
        ]);
        let values = HashMap::from([("1.2.3.4".to_string(), 41.5)]);

        let batch = converter.convert(&values, 100);
        assert_eq!(
            batch,
            vec![Observation::new(
                "custom.custommibs.x.temp",
                100,
                MetricValue::Float(41.5)
            )]
        );
    }

    #[test]
    fn oids_are_unique() {
        let converter = CustomConverter::new([
            ("a".to_string(), "1.2.3".to_string()),
            ("b".to_string(), "1.2.3".to_string()),
            ("c".to_string(), "1.2.1".to_string()),
        ]);
        assert_eq!(converter.oids(), vec!["1.2.1".to_string(), "1.2.3".to_string()]);
        assert!(CustomConverter::default().is_empty());
    }
}
