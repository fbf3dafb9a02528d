//! Probe execution

use crate::config::EndpointConfig;
use crate::error::ProbeError;
use crate::extract::extract_data;
use bytes::Bytes;
use http::{Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use kidecar_plugin_api::Capabilities;
use kidecar_store::retry::Backoff;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Backoff between attempts of one probe round
pub const PROBE_BACKOFF: Backoff = Backoff {
    steps: 4,
    initial: Duration::from_millis(10),
    factor: 5.0,
    cap: Duration::from_secs(1),
};

/// Issues probe requests and stores what they return
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    client: Client<HttpConnector, Empty<Bytes>>,
    caps: Capabilities,
    backoff: Backoff,
}

impl ProbeExecutor {
    /// Create an executor that stores results through `caps`
    pub fn new(caps: Capabilities) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            caps,
            backoff: PROBE_BACKOFF,
        }
    }

    /// Override the retry backoff
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Probe once, retrying any failure with backoff
    pub async fn probe_with_retry(&self, endpoint: &EndpointConfig) -> Result<(), ProbeError> {
        let steps = self.backoff.steps.max(1);
        let mut delay = self.backoff.initial;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.probe(endpoint).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < steps => {
                    warn!(endpoint = %endpoint.url, attempt, error = %e, "Probe failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = self.backoff.next_delay(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Request the endpoint, check its status, extract and store the result
    pub async fn probe(&self, endpoint: &EndpointConfig) -> Result<(), ProbeError> {
        let body = self.fetch(endpoint).await?;
        let data = extract_data(&body, endpoint.json_path_config.as_ref())?;
        self.store(endpoint, &data).await
    }

    async fn fetch(&self, endpoint: &EndpointConfig) -> Result<Bytes, ProbeError> {
        let method = Method::from_bytes(endpoint.method().as_bytes())
            .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

        let mut builder = Request::builder().method(method).uri(endpoint.url.as_str());
        for (key, value) in &endpoint.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

        debug!(endpoint = %endpoint.url, "Probing");

        // the limit covers the headers and the whole body
        let limit = endpoint.timeout();
        let (status, body) = timeout(limit, async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| ProbeError::Request(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ProbeError::Body(e.to_string()))?
                .to_bytes();
            Ok::<_, ProbeError>((status, body))
        })
        .await
        .map_err(|_| ProbeError::Timeout(limit))??;

        if status != endpoint.expected_status() {
            return Err(ProbeError::UnexpectedStatus {
                got: status,
                expected: endpoint.expected_status(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }

    async fn store(&self, endpoint: &EndpointConfig, data: &Value) -> Result<(), ProbeError> {
        endpoint
            .storage_config
            .store_data(self.caps.storage(), data)
            .await?;
        debug!(endpoint = %endpoint.url, data = %data, "Stored probe result");
        Ok(())
    }
}
