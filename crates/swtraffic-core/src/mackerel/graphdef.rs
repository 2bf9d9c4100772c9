//! Graph definition payloads (`POST /api/v0/graph-defs/create`).

use serde::{Deserialize, Serialize};

use crate::mib::CounterKind;

/// One graph definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDef {
    pub name: String,
    pub display_name: String,
    pub unit: String,
    pub metrics: Vec<GraphDefMetric>,
}

/// A metric (or wildcard pattern) shown in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefMetric {
    pub name: String,
    pub display_name: String,
    pub is_stacked: bool,
}

fn builtin_display_name(kind: CounterKind) -> Option<&'static str> {
    match kind {
        CounterKind::InDiscards => Some("In Discards"),
        CounterKind::OutDiscards => Some("Out Discards"),
        CounterKind::InErrors => Some("In Errors"),
        CounterKind::OutErrors => Some("Out Errors"),
        _ => None,
    }
}

/// Graphs for the discard/error counters, one per kind, one line per interface.
pub fn builtin_graph_defs() -> Vec<GraphDef> {
    CounterKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let display_name = builtin_display_name(kind)?;
            let name = format!("custom.interface.{}", kind.mib_name());
            Some(GraphDef {
                metrics: vec![GraphDefMetric {
                    name: format!("{}.*", name),
                    display_name: "%1".to_string(),
                    is_stacked: false,
                }],
                name,
                display_name: display_name.to_string(),
                unit: "integer".to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defs_cover_discards_and_errors() {
        let defs = builtin_graph_defs();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "custom.interface.ifInDiscards",
                "custom.interface.ifOutDiscards",
                "custom.interface.ifInErrors",
                "custom.interface.ifOutErrors",
            ]
        );
        assert!(defs.iter().all(|d| d.unit == "integer"));
        assert_eq!(defs[2].display_name, "In Errors");
        assert_eq!(defs[2].metrics[0].name, "custom.interface.ifInErrors.*");
        assert_eq!(defs[2].metrics[0].display_name, "%1");
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(&builtin_graph_defs()[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "custom.interface.ifInDiscards",
                "displayName": "In Discards",
                "unit": "integer",
                "metrics": [
                    {"name": "custom.interface.ifInDiscards.*", "displayName": "%1", "isStacked": false}
                ]
            })
        );
    }
}
