//! Wire transport for signed request bodies

use crate::config::HealthVaultConfig;
use crate::error::{HealthVaultError, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Raw HTTP outcome of one round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: "OK".into(),
            body: body.into(),
        }
    }
}

/// Delivers a request body to the platform endpoint.
///
/// `method` is only used for error context. Timeouts and connection reuse
/// are the implementation's business.
pub trait Transport {
    fn send(&self, method: &str, payload: &str) -> Result<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, method: &str, payload: &str) -> Result<TransportResponse> {
        (**self).send(method, payload)
    }
}

/// HTTPS POST transport backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &HealthVaultConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| HealthVaultError::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, config.endpoint()))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: &str, payload: &str) -> Result<TransportResponse> {
        debug!(method, endpoint = %self.endpoint, bytes = payload.len(), "POST");

        let transport_err = |e: reqwest::Error| HealthVaultError::Transport {
            method: method.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(payload.to_string())
            .send()
            .map_err(transport_err)?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().map_err(transport_err)?;

        Ok(TransportResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}
