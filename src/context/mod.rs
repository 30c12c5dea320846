use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ConnectionConfig;

/// Control plane URL used when neither a URL nor a context is given
pub const DEFAULT_URL: &str = "https://localhost:443";

/// Default config file location: ~/.cluster-teardown/config
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cluster-teardown")
        .join("config")
}

/// Errors that can occur during context operations
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Context '{0}' not found")]
    ContextNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid path {0}: {1}")]
    InvalidPath(String, String),

    #[error("Client certificate and key must be given together")]
    IncompleteIdentity,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A named control plane endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Display name for this context
    pub name: String,
    /// URL of the control plane (e.g., "https://nuvo.example.com:443")
    pub url: String,
    /// Client certificate (PEM); `~` and `$VAR` are expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Client private key (PEM); `~` and `$VAR` are expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The complete configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Currently active context name
    #[serde(rename = "current-context")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Map of context name to context definition
    #[serde(default)]
    pub contexts: HashMap<String, Context>,
}

/// Connection overrides given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub context: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<Config, ContextError> {
    serde_yaml::from_str(content).map_err(|e| ContextError::ParseError(e.to_string()))
}

/// Get a context by name
pub fn get_context<'a>(config: &'a Config, name: &str) -> Result<&'a Context, ContextError> {
    config
        .contexts
        .get(name)
        .ok_or_else(|| ContextError::ContextNotFound(name.to_string()))
}

/// Expand `~` and environment variables in a file path
pub fn expand_path(path: &str) -> Result<PathBuf, ContextError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| ContextError::InvalidPath(path.to_string(), e.to_string()))
}

impl Config {
    /// The context selected by name, or the current one; `None` when neither is set
    pub fn select(&self, name: Option<&str>) -> Result<Option<&Context>, ContextError> {
        match name.or(self.current_context.as_deref()) {
            Some(name) => get_context(self, name).map(Some),
            None => Ok(None),
        }
    }

    /// Build the connection from a context plus command line overrides
    ///
    /// Explicit flags win over the context, which wins over [`DEFAULT_URL`].
    pub fn resolve(&self, overrides: &Overrides) -> Result<ConnectionConfig, ContextError> {
        let ctx = self.select(overrides.context.as_deref())?;

        let url = overrides
            .url
            .clone()
            .or_else(|| ctx.map(|c| c.url.clone()))
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let cert = overrides
            .cert
            .clone()
            .or_else(|| ctx.and_then(|c| c.cert.clone()));
        let key = overrides
            .key
            .clone()
            .or_else(|| ctx.and_then(|c| c.key.clone()));

        let conn = ConnectionConfig::new(url);
        match (cert, key) {
            (Some(cert), Some(key)) => Ok(conn.with_identity(expand_path(&cert)?, expand_path(&key)?)),
            (None, None) => Ok(conn),
            _ => Err(ContextError::IncompleteIdentity),
        }
    }
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from the default location
pub fn load_config() -> Result<Config, ContextError> {
    load_config_from(&default_config_path())
}

/// Load config from a specific path; a missing file is an empty config
pub fn load_config_from(path: &Path) -> Result<Config, ContextError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
