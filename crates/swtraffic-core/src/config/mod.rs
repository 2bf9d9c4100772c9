//! Daemon configuration.
//!
//! A YAML file ([`FileConfig`]) is loaded, validated and resolved into a
//! [`Config`]: regexes compiled, MIB names checked, custom MIB groups turned
//! into metric names and graph definitions.

mod file;
mod save;

pub use file::{CustomMib, CustomMibGroup, FileConfig, InterfaceSection, MackerelSection};
pub use save::save_host_id;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;
use thiserror::Error;

use crate::collector::InterfaceFilter;
use crate::mackerel::{GraphDef, GraphDefMetric};
use crate::mib::{self, CounterKind, MibError};

static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_.]+$").expect("static regex"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0} is needed")]
    Missing(&'static str),

    #[error("interface.include and interface.exclude are mutually exclusive")]
    ExclusiveFilters,

    #[error("invalid interface regex: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Mib(#[from] MibError),

    #[error("metric name is not valid: {0}")]
    MetricName(String),
}

/// Mackerel connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MackerelConfig {
    /// Id of an already registered host.
    pub host_id: Option<String>,
    pub api_key: String,
    /// Host name shown in Mackerel; defaults to the target address.
    pub name: String,
    /// Register the host without polling its interface table.
    pub ignore_network_info: bool,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub community: String,
    pub target: String,
    pub kinds: Vec<CounterKind>,
    pub filter: InterfaceFilter,
    pub skip_linkdown: bool,
    pub debug: bool,
    pub dry_run: bool,
    /// `None` forces dry-run.
    pub mackerel: Option<MackerelConfig>,
    /// One graph per custom MIB group.
    pub custom_graph_defs: Vec<GraphDef>,
    /// Metric name -> OID.
    pub custom_metrics: BTreeMap<String, String>,
    path: PathBuf,
}

impl Config {
    /// Reads and validates `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_file(file)?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Validates an already parsed file.
    pub fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        if file.community.is_empty() {
            return Err(ConfigError::Missing("community"));
        }
        if file.target.is_empty() {
            return Err(ConfigError::Missing("target"));
        }

        let filter = match file.interface {
            Some(InterfaceSection {
                include: Some(_),
                exclude: Some(_),
            }) => return Err(ConfigError::ExclusiveFilters),
            Some(InterfaceSection {
                include: Some(re), ..
            }) => InterfaceFilter::include(Regex::new(&re)?),
            Some(InterfaceSection {
                exclude: Some(re), ..
            }) => InterfaceFilter::exclude(Regex::new(&re)?),
            _ => InterfaceFilter::none(),
        };

        let kinds = mib::validate(&file.mibs)?;

        let mackerel = file.mackerel.map(|m| MackerelConfig {
            host_id: Some(m.host_id).filter(|id| !id.is_empty()),
            api_key: m.x_api_key,
            name: if m.name.is_empty() {
                file.target.clone()
            } else {
                m.name
            },
            ignore_network_info: m.ignore_network_info,
        });

        let mut custom_graph_defs = Vec::new();
        let mut custom_metrics = BTreeMap::new();
        for group in &file.custom_mibs {
            let resolved = resolve_custom_group(group)?;
            custom_graph_defs.push(resolved.graph_def);
            custom_metrics.extend(resolved.metrics);
        }

        Ok(Self {
            community: file.community,
            target: file.target,
            kinds,
            filter,
            skip_linkdown: file.skip_linkdown,
            debug: file.debug,
            dry_run: file.dry_run,
            mackerel,
            custom_graph_defs,
            custom_metrics,
            path: PathBuf::new(),
        })
    }

    /// File this config was loaded from (empty for [`Config::from_file`]).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Graph name shared by every metric of a custom group.
pub fn custom_graph_name(group_display_name: &str) -> String {
    format!(
        "custom.custommibs.{:x}",
        Md5::digest(group_display_name.as_bytes())
    )
}

pub fn custom_metric_name(group_display_name: &str, metric_name: &str) -> String {
    format!("{}.{}", custom_graph_name(group_display_name), metric_name)
}

#[derive(Debug, PartialEq)]
struct ResolvedGroup {
    /// metric name -> OID
    metrics: BTreeMap<String, String>,
    graph_def: GraphDef,
}

fn resolve_custom_group(group: &CustomMibGroup) -> Result<ResolvedGroup, ConfigError> {
    let mut metrics = BTreeMap::new();
    let mut graph_metrics = Vec::new();

    for entry in &group.mibs {
        let metric_name = if entry.metric_name.is_empty() {
            &entry.display_name
        } else {
            &entry.metric_name
        };
        if !METRIC_NAME.is_match(metric_name) {
            return Err(ConfigError::MetricName(metric_name.clone()));
        }
        mib::validate_custom(&entry.mib)?;

        let name = custom_metric_name(&group.display_name, metric_name);
        graph_metrics.push(GraphDefMetric {
            name: name.clone(),
            display_name: entry.display_name.clone(),
            is_stacked: false,
        });
        metrics.insert(name, entry.mib.clone());
    }

    Ok(ResolvedGroup {
        metrics,
        graph_def: GraphDef {
            name: custom_graph_name(&group.display_name),
            display_name: group.display_name.clone(),
            unit: group.unit.clone(),
            metrics: graph_metrics,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // md5("")
    const EMPTY_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn mib(display_name: &str, metric_name: &str, oid: &str) -> CustomMib {
        CustomMib {
            display_name: display_name.to_string(),
            metric_name: metric_name.to_string(),
            mib: oid.to_string(),
        }
    }

    fn group(mibs: Vec<CustomMib>) -> CustomMibGroup {
        CustomMibGroup {
            mibs,
            ..Default::default()
        }
    }

    fn minimal() -> FileConfig {
        FileConfig {
            community: "public".to_string(),
            target: "192.0.2.1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn custom_group_uses_metric_name() {
        let resolved = resolve_custom_group(&group(vec![mib("", "foo.bar", "1.2.3.4")])).unwrap();
        let name = format!("custom.custommibs.{}.foo.bar", EMPTY_DIGEST);
        assert_eq!(resolved.metrics[&name], "1.2.3.4");
        assert_eq!(
            resolved.graph_def.name,
            format!("custom.custommibs.{}", EMPTY_DIGEST)
        );
        assert_eq!(resolved.graph_def.metrics[0].name, name);
        assert_eq!(resolved.graph_def.metrics[0].display_name, "");
    }

    #[test]
    fn custom_group_keeps_display_name() {
        let resolved =
            resolve_custom_group(&group(vec![mib("foobarbaz", "foo.bar", "1.2.3.4")])).unwrap();
        assert_eq!(resolved.graph_def.metrics[0].display_name, "foobarbaz");
        assert!(resolved.graph_def.metrics[0].name.ends_with(".foo.bar"));
    }

    #[test]
    fn metric_name_defaults_to_display_name() {
        let resolved = resolve_custom_group(&group(vec![mib("cpu", "", "1.2.3.4")])).unwrap();
        assert!(resolved.metrics.keys().next().unwrap().ends_with(".cpu"));
    }

    #[test]
    fn custom_group_with_several_mibs() {
        let resolved = resolve_custom_group(&group(vec![
            mib("", "foo.bar", "1.2.3.4"),
            mib("", "foo.baz", "5.6.7.8"),
        ]))
        .unwrap();
        let oids: Vec<&String> = resolved.metrics.values().collect();
        assert_eq!(oids, vec!["1.2.3.4", "5.6.7.8"]);
        assert_eq!(resolved.graph_def.metrics.len(), 2);
    }

    #[test]
    fn rejects_bad_custom_entries() {
        assert!(matches!(
            resolve_custom_group(&group(vec![mib("", "foo.bar", "1.2.3.4...")])),
            Err(ConfigError::Mib(_))
        ));
        assert!(matches!(
            resolve_custom_group(&group(vec![mib("", "foo.あ.bar", "1.2.3.4")])),
            Err(ConfigError::MetricName(_))
        ));
        assert!(matches!(
            resolve_custom_group(&group(vec![mib("", "", "1.2.3.4")])),
            Err(ConfigError::MetricName(_))
        ));
    }

    #[test]
    fn graph_name_is_md5_of_display_name() {
        assert_eq!(
            custom_graph_name("Temperature"),
            format!("custom.custommibs.{:x}", Md5::digest(b"Temperature"))
        );
        assert_eq!(
            custom_metric_name("", "cpu"),
            format!("custom.custommibs.{}.cpu", EMPTY_DIGEST)
        );
    }

    #[test]
    fn requires_community_and_target() {
        let mut file = minimal();
        file.community.clear();
        assert!(matches!(
            Config::from_file(file),
            Err(ConfigError::Missing("community"))
        ));

        let mut file = minimal();
        file.target.clear();
        assert!(matches!(
            Config::from_file(file),
            Err(ConfigError::Missing("target"))
        ));
    }

    #[test]
    fn filters_are_exclusive() {
        let mut file = minimal();
        file.interface = Some(InterfaceSection {
            include: Some("^ge-".to_string()),
            exclude: Some("^lo".to_string()),
        });
        assert!(matches!(
            Config::from_file(file),
            Err(ConfigError::ExclusiveFilters)
        ));
    }

    #[test]
    fn bad_regex_and_unknown_mib_are_rejected() {
        let mut file = minimal();
        file.interface = Some(InterfaceSection {
            include: Some("(".to_string()),
            exclude: None,
        });
        assert!(matches!(Config::from_file(file), Err(ConfigError::Regex(_))));

        let mut file = minimal();
        file.mibs = vec!["ifUnknown".to_string()];
        assert!(matches!(Config::from_file(file), Err(ConfigError::Mib(_))));
    }

    #[test]
    fn defaults_when_optional_keys_absent() {
        let config = Config::from_file(minimal()).unwrap();
        assert_eq!(config.kinds, CounterKind::defaults());
        assert!(config.filter.allows("anything"));
        assert!(config.mackerel.is_none());
        assert!(config.custom_metrics.is_empty());
        assert!(!config.dry_run);
    }

    #[test]
    fn mackerel_name_defaults_to_target() {
        let mut file = minimal();
        file.mackerel = Some(MackerelSection {
            x_api_key: "secret".to_string(),
            ..Default::default()
        });
        let mackerel = Config::from_file(file).unwrap().mackerel.unwrap();
        assert_eq!(mackerel.name, "192.0.2.1");
        assert_eq!(mackerel.host_id, None);
        assert_eq!(mackerel.api_key, "secret");
    }

    #[test]
    fn load_reads_yaml_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            "community: public\ntarget: 192.0.2.1\ninterface:\n  exclude: \"^lo\"\nmibs:\n  - ifHCInOctets\n  - ifInErrors\nskip-linkdown: true\nmackerel:\n  host-id: abc\n  x-api-key: secret\n  name: core-sw\ncustom-mibs:\n  - display-name: Temperature\n    unit: float\n    mibs:\n      - display-name: cpu\n        mib: 1.3.6.1.4.1.9.9.13.1.3.1.3.1\n"
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.path(), tmp.path());
        assert_eq!(
            config.kinds,
            vec![CounterKind::HcInOctets, CounterKind::InErrors]
        );
        assert!(!config.filter.allows("lo0"));
        assert!(config.filter.allows("ge-0/0/1"));
        assert!(config.skip_linkdown);
        let mackerel = config.mackerel.unwrap();
        assert_eq!(mackerel.host_id.as_deref(), Some("abc"));
        assert_eq!(mackerel.name, "core-sw");
        let oids: Vec<&String> = config.custom_metrics.values().collect();
        assert_eq!(oids, vec!["1.3.6.1.4.1.9.9.13.1.3.1.3.1"]);
        assert_eq!(config.custom_graph_defs[0].unit, "float");
        assert_eq!(config.custom_graph_defs[0].display_name, "Temperature");
    }

    #[test]
    fn load_reports_missing_file_and_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("absent.yaml")),
            Err(ConfigError::Io { .. })
        ));

        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "community: [unclosed").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Yaml { .. })));
    }
}
