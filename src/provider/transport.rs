// src/provider/transport.rs
// HTTP transport to the hotel search provider

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::ExternalRequestContext;
use crate::config::ProviderConfig;

/// Raw provider reply. Non-2xx statuses are replies too; classification
/// happens in the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to build request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: &ExternalRequestContext) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with a pooled client.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    application_id: String,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            application_id: config.application_id.clone(),
        })
    }

    fn url(&self, request: &ExternalRequestContext) -> String {
        format!("{}/{}", self.base_url, request.endpoint.path())
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, request: &ExternalRequestContext) -> Result<TransportResponse, TransportError> {
        let mut query = vec![
            ("applicationId".to_string(), self.application_id.clone()),
            ("format".to_string(), "json".to_string()),
        ];
        query.extend(request.query_pairs());

        tracing::debug!(endpoint = %request.endpoint, "provider request");

        let response = self.client.get(self.url(request)).query(&query).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(TransportResponse { status, body })
    }
}
