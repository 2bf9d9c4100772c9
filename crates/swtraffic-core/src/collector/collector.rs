//! Interface collector.
//!
//! The `Collector` polls a [`CounterSource`] for the configured counters,
//! applies the interface filters and produces one [`Snapshot`] per call.

use std::collections::{BTreeMap, HashMap};

use chrono::Local;
use regex::Regex;
use tracing::debug;

use crate::collector::traits::{CounterSource, PollError};
use crate::mib::CounterKind;
use crate::model::{CounterSample, Snapshot};

/// Include/exclude rules on interface labels.
#[derive(Debug, Clone, Default)]
pub struct InterfaceFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl InterfaceFilter {
    /// Keeps all interfaces.
    pub fn none() -> Self {
        Self::default()
    }

    /// Keeps only interfaces whose label matches `re`.
    pub fn include(re: Regex) -> Self {
        Self {
            include: Some(re),
            exclude: None,
        }
    }

    /// Drops interfaces whose label matches `re`.
    pub fn exclude(re: Regex) -> Self {
        Self {
            include: None,
            exclude: Some(re),
        }
    }

    pub fn allows(&self, if_name: &str) -> bool {
        if let Some(re) = &self.include
            && !re.is_match(if_name)
        {
            return false;
        }
        if let Some(re) = &self.exclude
            && re.is_match(if_name)
        {
            return false;
        }
        true
    }
}

/// An interface as announced to the metrics service at host registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ipv4_addresses: Vec<String>,
    pub mac_address: Option<String>,
}

/// Collects interface counters into snapshots.
pub struct Collector<S: CounterSource> {
    source: S,
    kinds: Vec<CounterKind>,
    filter: InterfaceFilter,
    skip_linkdown: bool,
    custom_oids: Vec<String>,
    debug: bool,
}

impl<S: CounterSource> Collector<S> {
    /// Creates a collector polling `kinds` from `source`.
    pub fn new(source: S, kinds: Vec<CounterKind>) -> Self {
        Self {
            source,
            kinds,
            filter: InterfaceFilter::none(),
            skip_linkdown: false,
            custom_oids: Vec::new(),
            debug: false,
        }
    }

    pub fn with_filter(mut self, filter: InterfaceFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Leaves out interfaces whose operational state is down.
    pub fn skip_linkdown(mut self, skip: bool) -> Self {
        self.skip_linkdown = skip;
        self
    }

    pub fn with_custom_oids(mut self, oids: Vec<String>) -> Self {
        self.custom_oids = oids;
        self
    }

    /// Prints every collected snapshot to stdout.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Polls every configured counter for every kept interface.
    pub fn collect_snapshot(&mut self) -> Result<Snapshot, PollError> {
        let if_count = self.source.interface_count()?;
        let names = self.source.interface_names(if_count)?;
        let oper_state = if self.skip_linkdown {
            self.source.interface_oper_state(if_count)?
        } else {
            BTreeMap::new()
        };

        let mut samples = Vec::new();
        for &kind in &self.kinds {
            for (if_index, value) in self.source.counters(kind, if_count)? {
                let if_name = names.get(&if_index).cloned().unwrap_or_default();
                if !self.filter.allows(&if_name) {
                    continue;
                }
                if self.skip_linkdown && !oper_state.get(&if_index).copied().unwrap_or(false) {
                    continue;
                }
                samples.push(CounterSample {
                    if_index,
                    kind,
                    if_name,
                    value,
                });
            }
        }

        let snapshot = Snapshot::new(samples);
        debug!(
            interfaces = if_count,
            samples = snapshot.len(),
            "snapshot collected"
        );
        if self.debug {
            print_snapshot(&snapshot);
        }
        Ok(snapshot)
    }

    /// Reads the configured custom OIDs.
    pub fn collect_custom(&mut self) -> Result<HashMap<String, f64>, PollError> {
        if self.custom_oids.is_empty() {
            return Ok(HashMap::new());
        }
        self.source.values(&self.custom_oids)
    }

    /// Interfaces carrying an IPv4 address, sorted by name.
    pub fn interface_inventory(&mut self) -> Result<Vec<NetworkInterface>, PollError> {
        let if_count = self.source.interface_count()?;
        let addresses = self.source.interface_addresses()?;
        let names = self.source.interface_names(if_count)?;
        let mut phys = self.source.interface_phys_addresses(if_count)?;

        let mut interfaces: Vec<NetworkInterface> = addresses
            .into_iter()
            .filter_map(|(if_index, ipv4_addresses)| {
                let name = names.get(&if_index)?.clone();
                Some(NetworkInterface {
                    name,
                    ipv4_addresses,
                    mac_address: phys.remove(&if_index).filter(|mac| !mac.is_empty()),
                })
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

/// Renders a snapshot as a table, one sample per line, ordered by interface.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut samples: Vec<&CounterSample> = snapshot.samples.iter().collect();
    samples.sort_by(|a, b| (a.if_index, a.kind).cmp(&(b.if_index, b.kind)));
    samples
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_snapshot(snapshot: &Snapshot) {
    // clear screen, cursor home
    print!("\x1b[H\x1b[2J");
    println!("{}", Local::now().format("%a %b %e %H:%M:%S %Y"));
    println!("{}", format_snapshot(snapshot));
}
