use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};

use super::{ApiError, Filter, Patch};
use crate::model::ResourceKind;

/// Base path of the resource API
pub const API_PREFIX: &str = "/api/v1";

/// Default per-request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

/// Untyped request/response access to the control plane resource API
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// List the objects of `kind` matching every filter parameter
    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>, ApiError>;

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Value, ApiError>;

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<Value, ApiError>;

    /// Apply a partial update, conditioned on `version` when given
    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        version: Option<u64>,
        patch: &Patch,
    ) -> Result<Value, ApiError>;

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError>;

    /// Connectivity and authorization probe
    async fn ping(&self) -> Result<(), ApiError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

/// How to reach the control plane
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base URL, e.g. "https://localhost:443"
    pub url: String,

    /// Client certificate (PEM) for secure connections
    pub cert: Option<PathBuf>,

    /// Client private key (PEM) for secure connections
    pub key: Option<PathBuf>,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cert: None,
            key: None,
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }

    /// Use a client certificate and key
    pub fn with_identity(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self.key = Some(key.into());
        self
    }

    pub fn has_identity(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// HTTP(S) client for the control plane resource API
#[derive(Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    /// Build a client; reads the certificate and key when both are configured
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs))
            // the control plane serves a self-signed certificate
            .danger_accept_invalid_certs(true);

        if let (Some(cert), Some(key)) = (&config.cert, &config.key) {
            let mut pem = std::fs::read(cert)
                .map_err(|e| ApiError::Tls(format!("{}: {}", cert.display(), e)))?;
            pem.push(b'\n');
            pem.extend(
                std::fs::read(key)
                    .map_err(|e| ApiError::Tls(format!("{}: {}", key.display(), e)))?,
            );
            let identity =
                reqwest::Identity::from_pem(&pem).map_err(|e| ApiError::Tls(e.to_string()))?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| ApiError::Tls(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        self.client
            .request(method, &url)
            .header("Accept", "application/json")
    }

    async fn send(
        &self,
        operation: String,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), ApiError> {
        trace!("{}", operation);
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        if !status.is_success() {
            debug!("{} failed: {} {}", operation, status, body);
            return Err(ApiError::from_status(operation, status.as_u16(), body));
        }
        Ok((status, body))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(operation: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(format!("{}: {}", operation, e)))
}

#[async_trait]
impl ControlPlaneApi for HttpControlPlane {
    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>, ApiError> {
        let operation = format!("query {}({})", kind, filter);
        let request = self
            .build_request(Method::GET, &format!("/{}", kind.path()))
            .query(filter.params());
        let (_, body) = self.send(operation.clone(), request).await?;
        parse_json(&operation, &body)
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Value, ApiError> {
        let operation = format!("query {}[{}]", kind, id);
        let request = self.build_request(Method::GET, &format!("/{}/{}", kind.path(), id));
        let (_, body) = self.send(operation.clone(), request).await?;
        parse_json(&operation, &body)
    }

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<Value, ApiError> {
        let operation = format!("POST {}", kind);
        let request = self
            .build_request(Method::POST, &format!("/{}", kind.path()))
            .json(&body);
        let (_, body) = self.send(operation.clone(), request).await?;
        parse_json(&operation, &body)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        version: Option<u64>,
        patch: &Patch,
    ) -> Result<Value, ApiError> {
        let operation = format!("update {}[{}]", kind, id);
        let request = self
            .build_request(Method::PATCH, &format!("/{}/{}", kind.path(), id))
            .query(&patch.query(version))
            .json(patch.body());
        let (_, body) = self.send(operation.clone(), request).await?;
        parse_json(&operation, &body)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        let operation = format!("delete {}[{}]", kind, id);
        let request = self.build_request(Method::DELETE, &format!("/{}/{}", kind.path(), id));
        self.send(operation, request).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let request = self.build_request(Method::GET, "/system");
        self.send("query system".to_string(), request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new("https://localhost:443");
        assert_eq!(config.timeout_secs, REQUEST_TIMEOUT_SECS);
        assert!(!config.has_identity());

        let config = config.with_identity("/tmp/client.crt", "/tmp/client.key");
        assert!(config.has_identity());
    }

    #[test]
    fn test_connect_trims_trailing_slash() {
        let client = HttpControlPlane::connect(&ConnectionConfig::new("http://localhost:8443/"))
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8443");
    }

    #[test]
    fn test_connect_missing_cert_file() {
        let config = ConnectionConfig::new("https://localhost")
            .with_identity("/nonexistent/client.crt", "/nonexistent/client.key");
        let result = HttpControlPlane::connect(&config);
        assert!(matches!(result, Err(ApiError::Tls(_))));
    }
}
