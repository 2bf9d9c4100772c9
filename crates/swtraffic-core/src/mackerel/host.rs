//! Host registration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::NetworkInterface;
use crate::mackerel::{MackerelApi, MackerelError, builtin_graph_defs};

/// Body of host create/update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostParam {
    pub name: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub interfaces: Vec<HostInterface>,
}

/// Network interface as shown on the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInterface {
    pub name: String,
    #[serde(default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mac_address: Option<String>,
}

impl From<NetworkInterface> for HostInterface {
    fn from(iface: NetworkInterface) -> Self {
        Self {
            name: iface.name,
            ipv4_addresses: iface.ipv4_addresses,
            mac_address: iface.mac_address,
        }
    }
}

/// Everything needed to create or refresh the device's host entry.
#[derive(Debug, Clone)]
pub struct HostRegistration {
    pub name: String,
    /// Device address, used as the sole interface when none are known.
    pub target_addr: String,
    pub host_id: Option<String>,
}

impl HostRegistration {
    fn param(&self, interfaces: Vec<NetworkInterface>) -> HostParam {
        let interfaces = if interfaces.is_empty() {
            vec![HostInterface {
                name: "main".to_string(),
                ipv4_addresses: vec![self.target_addr.clone()],
                mac_address: None,
            }]
        } else {
            interfaces.into_iter().map(HostInterface::from).collect()
        };
        HostParam {
            name: self.name.clone(),
            meta: BTreeMap::new(),
            interfaces,
        }
    }

    /// Creates or updates the host, then installs the built-in graphs.
    ///
    /// Returns the id of a newly created host, or `None` when an existing one
    /// was updated.
    pub fn register(
        &self,
        api: &dyn MackerelApi,
        interfaces: Vec<NetworkInterface>,
    ) -> Result<Option<String>, MackerelError> {
        let param = self.param(interfaces);
        let created = match self.host_id.as_deref().filter(|id| !id.is_empty()) {
            Some(host_id) => {
                api.update_host(host_id, &param)?;
                info!(host_id, name = %param.name, "host updated");
                None
            }
            None => {
                let host_id = api.create_host(&param)?;
                info!(host_id = %host_id, name = %param.name, "host created");
                Some(host_id)
            }
        };
        api.create_graph_defs(&builtin_graph_defs())?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mackerel::GraphDef;
    use crate::model::Observation;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(HostParam),
        Update(String, HostParam),
        GraphDefs(usize),
    }

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<Call>>,
        fail_create: bool,
        fail_update: bool,
        fail_graph_defs: bool,
    }

    fn failure() -> MackerelError {
        MackerelError::Status {
            status: 500,
            body: "internal error".to_string(),
        }
    }

    impl MackerelApi for MockApi {
        fn create_host(&self, param: &HostParam) -> Result<String, MackerelError> {
            self.calls.lock().unwrap().push(Call::Create(param.clone()));
            if self.fail_create {
                return Err(failure());
            }
            Ok("newHostID".to_string())
        }

        fn update_host(&self, host_id: &str, param: &HostParam) -> Result<(), MackerelError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(host_id.to_string(), param.clone()));
            if self.fail_update {
                return Err(failure());
            }
            Ok(())
        }

        fn create_graph_defs(&self, defs: &[GraphDef]) -> Result<(), MackerelError> {
            self.calls.lock().unwrap().push(Call::GraphDefs(defs.len()));
            if self.fail_graph_defs {
                return Err(failure());
            }
            Ok(())
        }

        fn post_host_metric_values(
            &self,
            _host_id: &str,
            _observations: &[Observation],
        ) -> Result<(), MackerelError> {
            Ok(())
        }
    }

    fn registration(host_id: Option<&str>) -> HostRegistration {
        HostRegistration {
            name: "hostname".to_string(),
            target_addr: "192.0.2.1".to_string(),
            host_id: host_id.map(str::to_string),
        }
    }

    #[test]
    fn creates_host_when_id_unknown() {
        let api = MockApi::default();
        let created = registration(None).register(&api, Vec::new()).unwrap();
        assert_eq!(created.as_deref(), Some("newHostID"));

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let Call::Create(param) = &calls[0] else {
            panic!("expected create, got {:?}", calls[0]);
        };
        assert_eq!(param.name, "hostname");
        assert_eq!(
            param.interfaces,
            vec![HostInterface {
                name: "main".to_string(),
                ipv4_addresses: vec!["192.0.2.1".to_string()],
                mac_address: None,
            }]
        );
        assert_eq!(calls[1], Call::GraphDefs(4));
    }

    #[test]
    fn updates_host_when_id_known() {
        let api = MockApi::default();
        let created = registration(Some("currentID"))
            .register(&api, Vec::new())
            .unwrap();
        assert_eq!(created, None);

        let calls = api.calls.lock().unwrap();
        assert!(matches!(&calls[0], Call::Update(id, _) if id == "currentID"));
        assert_eq!(calls[1], Call::GraphDefs(4));
    }

    #[test]
    fn empty_host_id_is_treated_as_unknown() {
        let api = MockApi::default();
        let created = registration(Some("")).register(&api, Vec::new()).unwrap();
        assert_eq!(created.as_deref(), Some("newHostID"));
    }

    #[test]
    fn announces_collected_interfaces() {
        let api = MockApi::default();
        let interfaces = vec![NetworkInterface {
            name: "eth1".to_string(),
            ipv4_addresses: vec!["192.0.2.2".to_string()],
            mac_address: Some("00:00:4c:23:45:67".to_string()),
        }];
        registration(None).register(&api, interfaces).unwrap();

        let calls = api.calls.lock().unwrap();
        let Call::Create(param) = &calls[0] else {
            panic!("expected create, got {:?}", calls[0]);
        };
        assert_eq!(param.interfaces.len(), 1);
        assert_eq!(param.interfaces[0].name, "eth1");
        assert_eq!(
            param.interfaces[0].mac_address.as_deref(),
            Some("00:00:4c:23:45:67")
        );
    }

    #[test]
    fn create_failure_aborts_before_graph_defs() {
        let api = MockApi {
            fail_create: true,
            ..Default::default()
        };
        assert!(registration(None).register(&api, Vec::new()).is_err());
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn update_failure_aborts_before_graph_defs() {
        let api = MockApi {
            fail_update: true,
            ..Default::default()
        };
        assert!(registration(Some("currentID")).register(&api, Vec::new()).is_err());
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn graph_defs_failure_is_reported() {
        let api = MockApi {
            fail_graph_defs: true,
            ..Default::default()
        };
        assert!(registration(None).register(&api, Vec::new()).is_err());
        assert!(registration(Some("currentID")).register(&api, Vec::new()).is_err());
    }

    #[test]
    fn host_param_json_shape() {
        let param = registration(None).param(Vec::new());
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "hostname",
                "meta": {},
                "interfaces": [{"name": "main", "ipv4Addresses": ["192.0.2.1"]}]
            })
        );
    }
}
