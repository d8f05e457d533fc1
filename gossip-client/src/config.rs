//! Configuration loading for the Gossip client.
//!
//! Configuration is loaded from a TOML file (default: `gossip.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Backend configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Request/acknowledgement configuration.
    #[serde(default)]
    pub requests: RequestsConfig,
    /// Contact listing configuration.
    #[serde(default)]
    pub social: SocialConfig,
    /// Authentication flow configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Origin of the backend, `http(s)://` or `ws(s)://`.
    #[serde(default = "default_origin")]
    pub origin: String,
}

/// Request/acknowledgement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestsConfig {
    /// Seconds to wait for an acknowledgement (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Contact listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    /// Concurrent user lookups when hydrating friend requests (default: 4).
    #[serde(default = "default_hydration_concurrency")]
    pub hydration_concurrency: usize,
}

/// Authentication flow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Seconds between OTP resend requests (default: 60).
    #[serde(default = "default_resend_cooldown_secs")]
    pub resend_cooldown_secs: u64,
}

// Default value functions
fn default_origin() -> String {
    "https://gossip.backend.wishalpha.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_hydration_concurrency() -> usize {
    4
}

fn default_resend_cooldown_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            hydration_concurrency: default_hydration_concurrency(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            resend_cooldown_secs: default_resend_cooldown_secs(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointing at `origin`.
    pub fn with_origin(origin: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.server.origin = origin.into();
        config
    }

    /// Acknowledgement timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.requests.timeout_secs)
    }

    /// OTP resend cooldown.
    pub fn resend_cooldown(&self) -> Duration {
        Duration::from_secs(self.auth.resend_cooldown_secs)
    }

    /// Lookup concurrency, at least one.
    pub fn hydration_concurrency(&self) -> usize {
        self.social.hydration_concurrency.max(1)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
