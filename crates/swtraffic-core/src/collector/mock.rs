//! In-memory counter source for testing collectors without a device.

use std::collections::{BTreeMap, HashMap};

use crate::collector::traits::{CounterSource, PollError};
use crate::mib::CounterKind;

/// In-memory device.
///
/// Stores interface tables in memory so tests can simulate a switch, mutate
/// counters between ticks and inject transport failures.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    names: BTreeMap<u64, String>,
    oper_state: BTreeMap<u64, bool>,
    counters: HashMap<CounterKind, BTreeMap<u64, u64>>,
    addresses: BTreeMap<u64, Vec<String>>,
    phys_addresses: BTreeMap<u64, String>,
    values: HashMap<String, f64>,
    failing: bool,
}

impl MockSource {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// A four-port switch: `lo0` and `eth0..eth2`, with `eth0` down.
    pub fn typical_switch() -> Self {
        let mut source = Self::new();
        source.add_interface(1, "lo0", true);
        source.add_interface(2, "eth0", false);
        source.add_interface(3, "eth1", true);
        source.add_interface(4, "eth2", true);
        for idx in 1..=4 {
            for kind in CounterKind::ALL {
                source.set_counter(kind, idx, 0);
            }
        }
        source.add_address(1, "127.0.0.1");
        source.add_address(2, "192.0.2.1");
        source.add_address(3, "192.0.2.2");
        source.add_address(3, "192.0.2.3");
        source.add_address(4, "198.51.100.1");
        source.add_address(5, "198.51.100.2");
        source.set_phys_address(2, "00:00:87:12:34:56");
        source.set_phys_address(3, "00:00:4c:23:45:67");
        source.set_phys_address(4, "00:00:0e:34:56:78");
        source
    }

    pub fn add_interface(&mut self, if_index: u64, name: &str, up: bool) {
        self.names.insert(if_index, name.to_string());
        self.oper_state.insert(if_index, up);
    }

    pub fn set_counter(&mut self, kind: CounterKind, if_index: u64, value: u64) {
        self.counters
            .entry(kind)
            .or_default()
            .insert(if_index, value);
    }

    /// Adds `delta` to a counter, wrapping at the counter's ceiling.
    pub fn bump_counter(&mut self, kind: CounterKind, if_index: u64, delta: u64) {
        let ceiling = kind.overflow_ceiling();
        let entry = self
            .counters
            .entry(kind)
            .or_default()
            .entry(if_index)
            .or_insert(0);
        *entry = match entry.checked_add(delta) {
            Some(v) if v <= ceiling => v,
            _ => delta - (ceiling - *entry) - 1,
        };
    }

    pub fn add_address(&mut self, if_index: u64, address: &str) {
        self.addresses
            .entry(if_index)
            .or_default()
            .push(address.to_string());
    }

    pub fn set_phys_address(&mut self, if_index: u64, mac: &str) {
        self.phys_addresses.insert(if_index, mac.to_string());
    }

    pub fn set_value(&mut self, oid: &str, value: f64) {
        self.values.insert(oid.to_string(), value);
    }

    /// Makes every subsequent call fail with a transport error.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    fn check(&self) -> Result<(), PollError> {
        if self.failing {
            Err(PollError::Transport("request timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CounterSource for MockSource {
    fn interface_count(&mut self) -> Result<u64, PollError> {
        self.check()?;
        Ok(self.names.len() as u64)
    }

    fn interface_names(&mut self, _hint: u64) -> Result<BTreeMap<u64, String>, PollError> {
        self.check()?;
        Ok(self.names.clone())
    }

    fn interface_oper_state(&mut self, _hint: u64) -> Result<BTreeMap<u64, bool>, PollError> {
        self.check()?;
        Ok(self.oper_state.clone())
    }

    fn counters(
        &mut self,
        kind: CounterKind,
        _hint: u64,
    ) -> Result<BTreeMap<u64, u64>, PollError> {
        self.check()?;
        self.counters
            .get(&kind)
            .cloned()
            .ok_or_else(|| PollError::NoSuchObject(kind.oid().to_string()))
    }

    fn interface_addresses(&mut self) -> Result<BTreeMap<u64, Vec<String>>, PollError> {
        self.check()?;
        // loopback entries are dropped, as SnmpSource does
        Ok(self
            .addresses
            .iter()
            .filter_map(|(&if_index, addrs)| {
                let addrs: Vec<String> = addrs
                    .iter()
                    .filter(|a| !a.starts_with("127."))
                    .cloned()
                    .collect();
                (!addrs.is_empty()).then_some((if_index, addrs))
            })
            .collect())
    }

    fn interface_phys_addresses(
        &mut self,
        _hint: u64,
    ) -> Result<BTreeMap<u64, String>, PollError> {
        self.check()?;
        Ok(self.phys_addresses.clone())
    }

    fn values(&mut self, oids: &[String]) -> Result<HashMap<String, f64>, PollError> {
        self.check()?;
        Ok(oids
            .iter()
            .filter_map(|oid| self.values.get(oid).map(|v| (oid.clone(), *v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_wraps_at_ceiling() {
        let mut source = MockSource::new();
        source.set_counter(CounterKind::InOctets, 1, u32::MAX as u64 - 1);
        source.bump_counter(CounterKind::InOctets, 1, 3);
        assert_eq!(
            source.counters(CounterKind::InOctets, 0).unwrap()[&1],
            1
        );

        source.set_counter(CounterKind::HcInOctets, 1, u64::MAX);
        source.bump_counter(CounterKind::HcInOctets, 1, 1);
        assert_eq!(source.counters(CounterKind::HcInOctets, 0).unwrap()[&1], 0);
    }

    #[test]
    fn failing_source_errors_everywhere() {
        let mut source = MockSource::typical_switch();
        source.set_failing(true);
        assert!(source.interface_count().unwrap_err().is_transient());
        assert!(source.counters(CounterKind::HcInOctets, 4).is_err());
        source.set_failing(false);
        assert_eq!(source.interface_count().unwrap(), 4);
    }

    #[test]
    fn loopback_addresses_are_not_listed() {
        let mut source = MockSource::typical_switch();
        source.add_address(2, "127.0.0.2");
        let addresses = source.interface_addresses().unwrap();
        assert!(!addresses.contains_key(&1));
        assert_eq!(addresses[&2], vec!["192.0.2.1".to_string()]);
        assert_eq!(addresses[&3].len(), 2);
    }

    #[test]
    fn unknown_counter_is_no_such_object() {
        let mut source = MockSource::new();
        assert!(matches!(
            source.counters(CounterKind::OutErrors, 0),
            Err(PollError::NoSuchObject(_))
        ));
    }
}
