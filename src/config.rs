use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::api::Credentials;

/// Top-level configuration loaded from kuma.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct KumaConfig {
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Force the dedicated resume call on or off. Unset means the client
    /// assumes the server has it.
    pub resume_supported: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_secs: 10,
            resume_supported: None,
        }
    }
}

/// Values given on the command line or through the environment. Each one
/// that is set replaces the file value.
#[derive(Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Validated connection settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub url: Url,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub resume_supported: Option<bool>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing setting `{0}` (set it in the config file, a flag, or the environment)")]
    Missing(&'static str),
    #[error("invalid server url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,
}

impl KumaConfig {
    /// Load config from `path`.
    ///
    /// A missing file yields the defaults when `required` is false, so a run
    /// configured purely from flags and environment needs no file.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides and validate into connection settings.
    pub fn resolve(self, overrides: Overrides) -> Result<Settings, ConfigError> {
        let server = self.server;

        let raw_url = overrides
            .url
            .or(server.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::Missing("url"))?;
        let username = overrides
            .username
            .or(server.username)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("username"))?;
        let password = overrides
            .password
            .or(server.password)
            .ok_or(ConfigError::Missing("password"))?;
        let timeout_secs = overrides.timeout_secs.unwrap_or(server.timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: raw_url,
                reason: "scheme must be http, https, ws or wss".to_string(),
            });
        }

        Ok(Settings {
            url,
            credentials: Credentials { username, password },
            timeout: Duration::from_secs(timeout_secs),
            resume_supported: server.resume_supported,
        })
    }
}
