//! Gateway client for publishing batch reports.
//!
//! Each batch pass produces one [`BatchReport`]; this client forwards it to an
//! external reporting endpoint that fans it out to dashboards or alerting.

use crate::report::BatchReport;
use serde::{Deserialize, Serialize};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the reporting endpoint, e.g. `http://127.0.0.1:9000`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build a configuration from `SIGNALVOID_GATEWAY_URL` and
    /// `SIGNALVOID_GATEWAY_TOKEN`.
    pub fn from_env() -> Result<Self, GatewayError> {
        let base_url = std::env::var("SIGNALVOID_GATEWAY_URL")
            .map_err(|_| GatewayError::Config("SIGNALVOID_GATEWAY_URL is not set".to_string()))?;
        let token = std::env::var("SIGNALVOID_GATEWAY_TOKEN").unwrap_or_default();
        Ok(Self::new(base_url, token))
    }

    /// Get the report endpoint URL.
    pub fn reports_url(&self) -> String {
        format!("{}/v1/reports", self.base_url)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Gateway client error types.
#[derive(Debug)]
pub enum GatewayError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "Gateway config error: {msg}"),
            GatewayError::Network(msg) => write!(f, "Gateway network error: {msg}"),
            GatewayError::Server { status, message } => {
                write!(f, "Gateway server error ({status}): {message}")
            }
            GatewayError::Serialization(msg) => write!(f, "Gateway serialization error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Envelope around a published report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEnvelope<'a> {
    pub source: String,
    pub version: String,
    pub report: &'a BatchReport,
}

/// Acknowledgement from the reporting endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    /// Whether the report was accepted
    #[serde(default)]
    pub accepted: bool,
    /// Optional message from the gateway
    #[serde(default)]
    pub message: Option<String>,
}

/// Async client for the reporting endpoint.
#[cfg(feature = "gateway")]
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
    source_id: String,
}

#[cfg(feature = "gateway")]
impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let source_id = format!(
            "signalvoid-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            source_id,
        })
    }

    /// Test connection to the gateway.
    pub async fn test_connection(&self) -> Result<bool, GatewayError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Publish one batch report.
    pub async fn publish(&self, report: &BatchReport) -> Result<GatewayResponse, GatewayError> {
        let envelope = ReportEnvelope {
            source: self.source_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            report,
        };

        let response = self
            .client
            .post(self.config.reports_url())
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(&envelope)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// Blocking gateway client for use in synchronous contexts.
#[cfg(feature = "gateway")]
pub struct BlockingGatewayClient {
    inner: GatewayClient,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "gateway")]
impl BlockingGatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: GatewayClient::new(config)?,
            runtime,
        })
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn test_connection(&self) -> Result<bool, GatewayError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    pub fn publish(&self, report: &BatchReport) -> Result<GatewayResponse, GatewayError> {
        self.runtime.block_on(self.inner.publish(report))
    }

    pub fn source_id(&self) -> &str {
        self.inner.source_id()
    }
}
