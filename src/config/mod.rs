//! Configuration management for `pressmark.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `[remote]` | Backend endpoint, owned hosts, upload prefix, auth |

use crate::remote::Endpoint;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

// ============================================================================
// ConfigError
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing pressmark.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Remote backend settings
    pub remote: RemoteConfig,
}

impl Config {
    /// Load and validate configuration from the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let mut config: Self = toml::from_str(&raw)?;
        config.config_path = crate::utils::normalize_path(path);
        config.remote.validate()?;
        Ok(config)
    }
}

// ============================================================================
// [remote] section
// ============================================================================

/// Remote backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Backend base URL, e.g. `https://example.com`
    pub url: String,

    /// Additional host names recognized as belonging to this backend
    /// (e.g. a `www.` alias next to the apex domain)
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Path prefix under which the backend serves uploaded media
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,

    /// API username
    pub username: String,

    /// Environment variable holding the API application password
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

fn default_upload_prefix() -> String {
    "/wp-content/uploads/".to_string()
}

fn default_password_env() -> String {
    "PRESSMARK_PASSWORD".to_string()
}

impl RemoteConfig {
    /// Validate the section, collecting the first problem found.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("remote.url `{}` is not a valid URL: {e}", self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "remote.url `{}` must use http or https",
                self.url
            )));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Validation(format!(
                "remote.url `{}` has no host",
                self.url
            )));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.username must not be empty".to_string(),
            ));
        }
        if !self.upload_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "remote.upload_prefix `{}` must start with `/`",
                self.upload_prefix
            )));
        }
        Ok(())
    }

    /// Build the endpoint descriptor used by the reference classifier.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("remote.url `{}` is not a valid URL: {e}", self.url))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| {
                ConfigError::Validation(format!("remote.url `{}` has no host", self.url))
            })?
            .to_string();
        Ok(Endpoint::new(host, self.hosts.clone(), &self.upload_prefix))
    }

    /// Read the API password from the configured environment variable.
    pub fn password(&self) -> Result<String, ConfigError> {
        std::env::var(&self.password_env).map_err(|_| {
            ConfigError::Validation(format!(
                "environment variable {} is not set (required for remote.username `{}`)",
                self.password_env, self.username
            ))
        })
    }
}
