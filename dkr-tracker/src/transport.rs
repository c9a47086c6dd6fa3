//! HTTP access to the auto-tracker server

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::resource::Resource;

/// Where and how to reach the server for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// URL of the base endpoint used for reachability probes.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    pub fn resource_url(&self, resource: Resource) -> String {
        format!("http://{}:{}/{}", self.host, self.port, resource.path())
    }
}

/// Requests the polling loop issues against the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Succeeds if the server answered at all.
    async fn probe(&self, endpoint: &Endpoint) -> Result<()>;

    /// Fetch and decode the current content of `resource`.
    async fn fetch(&self, endpoint: &Endpoint, resource: Resource) -> Result<Value>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
        let url = endpoint.base_url();
        self.client
            .get(&url)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;
        Ok(())
    }

    async fn fetch(&self, endpoint: &Endpoint, resource: Resource) -> Result<Value> {
        let url = endpoint.resource_url(resource);
        let response = self
            .client
            .get(&url)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| network_error(&url, e))?;
        serde_json::from_slice(&body).map_err(|e| TrackerError::Decode {
            resource,
            message: e.to_string(),
        })
    }
}

fn network_error(url: &str, error: reqwest::Error) -> TrackerError {
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else {
        error.to_string()
    };
    TrackerError::Network {
        url: url.to_string(),
        message,
    }
}
