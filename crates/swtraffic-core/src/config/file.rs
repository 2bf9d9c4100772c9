//! On-disk YAML layout.
//!
//! These types mirror the file as written by the user. They are lenient
//! (every field defaults) so that a partial file can still be read back and
//! rewritten by [`super::save_host_id`]; validation happens in [`super::Config`].

use serde::{Deserialize, Serialize};

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub community: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<InterfaceSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mibs: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_linkdown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mackerel: Option<MackerelSection>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_mibs: Vec<CustomMibGroup>,
}

/// `interface:` include/exclude regexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MackerelSection {
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub x_api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_network_info: bool,
}

/// One `custom-mibs:` entry; becomes one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomMibGroup {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mibs: Vec<CustomMib>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomMib {
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metric_name: String,
    #[serde(default)]
    pub mib: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let yaml = r#"
community: public
target: 192.0.2.1
interface:
  include: "^ge-"
mibs: [ifHCInOctets, ifHCOutOctets]
skip-linkdown: true
mackerel:
  host-id: abc
  x-api-key: secret
  ignore-network-info: true
custom-mibs:
  - display-name: Temperature
    unit: float
    mibs:
      - display-name: cpu
        mib: 1.3.6.1.4.1.9.9.13.1.3.1.3.1
"#;
        let file: FileConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.community, "public");
        assert_eq!(
            file.interface.unwrap().include.as_deref(),
            Some("^ge-")
        );
        assert!(file.skip_linkdown);
        assert!(!file.dry_run);
        let mackerel = file.mackerel.unwrap();
        assert_eq!(mackerel.x_api_key, "secret");
        assert!(mackerel.ignore_network_info);
        assert_eq!(file.custom_mibs[0].mibs[0].mib, "1.3.6.1.4.1.9.9.13.1.3.1.3.1");
    }

    #[test]
    fn omits_unset_optional_keys() {
        let file = FileConfig {
            community: "public".to_string(),
            target: "192.0.2.1".to_string(),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&file).unwrap();
        assert!(yaml.contains("community: public"));
        assert!(!yaml.contains("mackerel"));
        assert!(!yaml.contains("skip-linkdown"));
        assert!(!yaml.contains("mibs"));
    }
}
