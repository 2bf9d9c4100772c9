//! Abstraction over the device polling transport.
//!
//! The `CounterSource` trait lets the collector read interface tables from a
//! real SNMP agent or from an in-memory mock in tests.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::mib::{CounterKind, MibError};

/// Error raised by a counter source. Every variant is a skip-this-tick condition.
#[derive(Debug, Error)]
pub enum PollError {
    /// Request could not be sent or no (matching) response arrived.
    #[error("snmp transport error: {0}")]
    Transport(String),

    /// Response could not be decoded.
    #[error("snmp error: {0}")]
    Protocol(String),

    /// Agent answered with a non-zero error-status.
    #[error("snmp agent error status {status} at index {index}")]
    ErrorStatus { status: u32, index: u32 },

    /// Value had a type that cannot be read as the expected one.
    #[error("unexpected value type for {oid}")]
    UnexpectedType { oid: String },

    /// Object does not exist on the agent.
    #[error("no such object: {0}")]
    NoSuchObject(String),

    #[error(transparent)]
    Oid(#[from] MibError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PollError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PollError::Transport(_) | PollError::Io(_))
    }
}

/// Source of interface counters, keyed by interface index.
///
/// `hint` is the interface count reported by the device; implementations may
/// use it to size bulk requests.
pub trait CounterSource: Send {
    /// Number of interfaces (`ifNumber.0`).
    fn interface_count(&mut self) -> Result<u64, PollError>;

    /// Interface labels (`ifDescr`).
    fn interface_names(&mut self, hint: u64) -> Result<BTreeMap<u64, String>, PollError>;

    /// Operational state (`ifOperStatus`); `true` unless the interface is down(2).
    fn interface_oper_state(&mut self, hint: u64) -> Result<BTreeMap<u64, bool>, PollError>;

    /// Raw cumulative values of one counter for every interface.
    fn counters(&mut self, kind: CounterKind, hint: u64)
    -> Result<BTreeMap<u64, u64>, PollError>;

    /// Non-loopback IPv4 addresses per interface (`ipAdEntIfIndex`).
    fn interface_addresses(&mut self) -> Result<BTreeMap<u64, Vec<String>>, PollError>;

    /// Hardware addresses (`ifPhysAddress`) formatted as `aa:bb:cc:dd:ee:ff`.
    fn interface_phys_addresses(&mut self, hint: u64)
    -> Result<BTreeMap<u64, String>, PollError>;

    /// Numeric values of arbitrary OIDs. OIDs the agent does not know are omitted.
    fn values(&mut self, oids: &[String]) -> Result<HashMap<String, f64>, PollError>;
}
