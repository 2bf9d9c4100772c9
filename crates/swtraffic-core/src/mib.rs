//! Interface counters supported by the collector.
//!
//! Every [`CounterKind`] carries a fixed row of properties: the IF-MIB object
//! it is polled from, the ceiling it wraps at, the traffic direction it
//! describes and whether it is reported as a per-second rate.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `IF-MIB::ifNumber.0`
pub const OID_IF_NUMBER: &str = "1.3.6.1.2.1.2.1.0";
/// `IF-MIB::ifDescr`
pub const OID_IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
/// `IF-MIB::ifPhysAddress`
pub const OID_IF_PHYS_ADDRESS: &str = "1.3.6.1.2.1.2.2.1.6";
/// `IF-MIB::ifOperStatus`
pub const OID_IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";
/// `IP-MIB::ipAdEntIfIndex`
pub const OID_IP_AD_ENT_IF_INDEX: &str = "1.3.6.1.2.1.4.20.1.2";

static NUMERIC_OID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.)+\d+$").expect("static regex"));

/// Error raised while validating MIB names and OIDs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MibError {
    #[error("mib {0} is not supported")]
    Unsupported(String),

    #[error("mib '{0}' is not supported")]
    InvalidOid(String),
}

/// Traffic direction of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

/// A polled interface counter, named after its IF-MIB object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CounterKind {
    #[serde(rename = "ifInOctets")]
    InOctets,
    #[serde(rename = "ifOutOctets")]
    OutOctets,
    #[serde(rename = "ifHCInOctets")]
    HcInOctets,
    #[serde(rename = "ifHCOutOctets")]
    HcOutOctets,
    #[serde(rename = "ifInDiscards")]
    InDiscards,
    #[serde(rename = "ifOutDiscards")]
    OutDiscards,
    #[serde(rename = "ifInErrors")]
    InErrors,
    #[serde(rename = "ifOutErrors")]
    OutErrors,
}

impl CounterKind {
    /// All supported counters, in table order.
    pub const ALL: [CounterKind; 8] = [
        CounterKind::InOctets,
        CounterKind::OutOctets,
        CounterKind::HcInOctets,
        CounterKind::HcOutOctets,
        CounterKind::InDiscards,
        CounterKind::OutDiscards,
        CounterKind::InErrors,
        CounterKind::OutErrors,
    ];

    /// The IF-MIB object name, e.g. `ifHCInOctets`.
    pub fn mib_name(self) -> &'static str {
        match self {
            CounterKind::InOctets => "ifInOctets",
            CounterKind::OutOctets => "ifOutOctets",
            CounterKind::HcInOctets => "ifHCInOctets",
            CounterKind::HcOutOctets => "ifHCOutOctets",
            CounterKind::InDiscards => "ifInDiscards",
            CounterKind::OutDiscards => "ifOutDiscards",
            CounterKind::InErrors => "ifInErrors",
            CounterKind::OutErrors => "ifOutErrors",
        }
    }

    /// Column OID walked to read this counter for every interface.
    pub fn oid(self) -> &'static str {
        match self {
            CounterKind::InOctets => "1.3.6.1.2.1.2.2.1.10",
            CounterKind::OutOctets => "1.3.6.1.2.1.2.2.1.16",
            CounterKind::HcInOctets => "1.3.6.1.2.1.31.1.1.1.6",
            CounterKind::HcOutOctets => "1.3.6.1.2.1.31.1.1.1.10",
            CounterKind::InDiscards => "1.3.6.1.2.1.2.2.1.13",
            CounterKind::OutDiscards => "1.3.6.1.2.1.2.2.1.19",
            CounterKind::InErrors => "1.3.6.1.2.1.2.2.1.14",
            CounterKind::OutErrors => "1.3.6.1.2.1.2.2.1.20",
        }
    }

    /// Largest value the counter holds before wrapping to zero.
    ///
    /// Only the legacy `Counter32` octet columns wrap at 2^32-1; everything
    /// else uses the wide ceiling.
    pub fn overflow_ceiling(self) -> u64 {
        match self {
            CounterKind::InOctets | CounterKind::OutOctets => u32::MAX as u64,
            _ => u64::MAX,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            CounterKind::InOctets
            | CounterKind::HcInOctets
            | CounterKind::InDiscards
            | CounterKind::InErrors => Direction::Receive,
            _ => Direction::Transmit,
        }
    }

    /// Byte counters are reported per second; the rest as plain deltas.
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            CounterKind::InOctets
                | CounterKind::OutOctets
                | CounterKind::HcInOctets
                | CounterKind::HcOutOctets
        )
    }

    /// Counters polled when the configuration names none.
    ///
    /// The 32-bit octet counters are left out; their 64-bit twins cover them.
    pub fn defaults() -> Vec<CounterKind> {
        CounterKind::ALL
            .into_iter()
            .filter(|k| !matches!(k, CounterKind::InOctets | CounterKind::OutOctets))
            .collect()
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mib_name())
    }
}

impl FromStr for CounterKind {
    type Err = MibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterKind::ALL
            .into_iter()
            .find(|k| k.mib_name() == s)
            .ok_or_else(|| MibError::Unsupported(s.to_string()))
    }
}

/// Resolves configured MIB names; an empty list selects [`CounterKind::defaults`].
/// Repeated names are kept once, at their first position.
pub fn validate(names: &[String]) -> Result<Vec<CounterKind>, MibError> {
    if names.is_empty() {
        return Ok(CounterKind::defaults());
    }
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: CounterKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Checks that a custom MIB is a dotted numeric OID.
pub fn validate_custom(oid: &str) -> Result<(), MibError> {
    if NUMERIC_OID.is_match(oid) {
        Ok(())
    } else {
        Err(MibError::InvalidOid(oid.to_string()))
    }
}

/// Parses `1.3.6.1...` into its arcs.
pub fn parse_oid(oid: &str) -> Result<Vec<u32>, MibError> {
    let oid = oid.trim_start_matches('.');
    oid.split('.')
        .map(|arc| arc.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| MibError::InvalidOid(oid.to_string()))
}

/// Formats OID arcs back into dotted notation.
pub fn format_oid(arcs: &[u32]) -> String {
    arcs.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
