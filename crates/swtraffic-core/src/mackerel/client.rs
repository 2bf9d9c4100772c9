//! Blocking HTTP client for the Mackerel REST API.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::mackerel::{GraphDef, HostParam, MackerelApi, MackerelError};
use crate::model::{MetricValue, Observation};
use crate::queue::{MetricSender, SendError};

#[derive(Debug, Deserialize)]
struct HostIdResponse {
    id: String,
}

/// Element of `POST /api/v0/tsdb`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HostMetricValue<'a> {
    host_id: &'a str,
    name: &'a str,
    time: i64,
    value: MetricValue,
}

/// Mackerel API client authenticated with an API key.
pub struct MackerelClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MackerelClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.mackerelio.com";
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(api_key: impl Into<String>) -> Result<Self, MackerelError> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL)
    }

    /// Client for a non-default endpoint (e.g. a proxy).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, MackerelError> {
        let http = Client::builder()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("swtraffic/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn execute(&self, request: RequestBuilder) -> Result<String, MackerelError> {
        let response = request.header("X-Api-Key", &self.api_key).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(MackerelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        trace!(status = status.as_u16(), "mackerel response");
        Ok(body)
    }

    fn host_id(body: &str) -> Result<String, MackerelError> {
        serde_json::from_str::<HostIdResponse>(body)
            .map(|r| r.id)
            .map_err(|e| MackerelError::Decode(e.to_string()))
    }
}

impl MackerelApi for MackerelClient {
    fn create_host(&self, param: &HostParam) -> Result<String, MackerelError> {
        let body = self.execute(self.http.post(self.url("/api/v0/hosts")).json(param))?;
        Self::host_id(&body)
    }

    fn update_host(&self, host_id: &str, param: &HostParam) -> Result<(), MackerelError> {
        let url = self.url(&format!("/api/v0/hosts/{}", host_id));
        self.execute(self.http.put(url).json(param))?;
        Ok(())
    }

    fn create_graph_defs(&self, defs: &[GraphDef]) -> Result<(), MackerelError> {
        self.execute(
            self.http
                .post(self.url("/api/v0/graph-defs/create"))
                .json(defs),
        )?;
        Ok(())
    }

    fn post_host_metric_values(
        &self,
        host_id: &str,
        observations: &[Observation],
    ) -> Result<(), MackerelError> {
        let payload = tsdb_payload(host_id, observations);
        self.execute(self.http.post(self.url("/api/v0/tsdb")).json(&payload))?;
        Ok(())
    }
}

impl MetricSender for MackerelClient {
    fn send(&self, identity: &str, observations: &[Observation]) -> Result<(), SendError> {
        self.post_host_metric_values(identity, observations)
            .map_err(|e| SendError(e.to_string()))
    }
}

fn tsdb_payload<'a>(host_id: &'a str, observations: &'a [Observation]) -> Vec<HostMetricValue<'a>> {
    observations
        .iter()
        .map(|obs| HostMetricValue {
            host_id,
            name: &obs.name,
            time: obs.time,
            value: obs.value,
        })
        .collect()
}
