//! Mackerel metrics service integration.
//!
//! - `client` - HTTP client over the REST API
//! - `graphdef` - graph definition payloads
//! - `host` - host registration at startup

mod client;
pub mod graphdef;
pub mod host;

pub use client::MackerelClient;
pub use graphdef::{GraphDef, GraphDefMetric, builtin_graph_defs};
pub use host::{HostInterface, HostParam, HostRegistration};

use thiserror::Error;

use crate::model::Observation;

/// Error talking to the Mackerel API.
#[derive(Debug, Error)]
pub enum MackerelError {
    #[error("mackerel request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mackerel API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid mackerel response: {0}")]
    Decode(String),
}

/// The subset of the Mackerel API used by the daemon.
pub trait MackerelApi: Send + Sync {
    /// Registers a new host and returns its id.
    fn create_host(&self, param: &HostParam) -> Result<String, MackerelError>;

    fn update_host(&self, host_id: &str, param: &HostParam) -> Result<(), MackerelError>;

    fn create_graph_defs(&self, defs: &[GraphDef]) -> Result<(), MackerelError>;

    fn post_host_metric_values(
        &self,
        host_id: &str,
        observations: &[Observation],
    ) -> Result<(), MackerelError>;
}
