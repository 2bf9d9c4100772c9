//! Device polling.
//!
//! [`CounterSource`] abstracts the transport ([`SnmpSource`] in production,
//! [`MockSource`] in tests); [`Collector`] turns its tables into snapshots.

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod snmp;
mod traits;

pub use collector::{Collector, InterfaceFilter, NetworkInterface, format_snapshot};
pub use mock::MockSource;
pub use snmp::SnmpSource;
pub use traits::{CounterSource, PollError};
