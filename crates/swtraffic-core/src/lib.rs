//! swtraffic-core - shared library for the swtraffic daemon.
//!
//! Provides:
//! - `mib` - supported interface counters and their fixed properties
//! - `model` - counter samples, snapshots, observations, batches
//! - `rates` - snapshot differ (wraparound-safe deltas and per-second rates)
//! - `custom` - pass-through conversion of custom OID values
//! - `queue` - at-least-once FIFO delivery queue and the sender trait
//! - `collector` - counter sources (SNMP, mock) and the interface collector
//! - `mackerel` - Mackerel API client, host registration, graph definitions
//! - `config` - YAML configuration loading, validation, host-id write-back
//! - `pipeline` - collection and delivery loops, shutdown signal

pub mod collector;
pub mod config;
pub mod custom;
pub mod mackerel;
pub mod mib;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod rates;

/// Crate version, shared with the daemon's `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
