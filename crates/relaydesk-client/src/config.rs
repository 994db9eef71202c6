//! Session channel configuration.
//!
//! Usually embedded in the host application's TOML config:
//!
//! ```toml
//! endpoint = "ws://localhost:8000/ws"
//! wire_format = "typed_frame"
//! connect_timeout_ms = 10000
//!
//! [reconnect]
//! strategy = "backoff"
//! base_ms = 1000
//! cap_ms = 5000
//! max_attempts = 5
//! ```

use crate::policy::ReconnectStrategy;
use relaydesk_core::WireFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";

const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_CAP_MS: u64 = 5_000;
const DEFAULT_BACKOFF_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Backend URL. Fixed for the life of the channel.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub wire_format: WireFormat,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            wire_format: WireFormat::default(),
            reconnect: ReconnectConfig::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ChannelConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ChannelConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("endpoint must not be empty"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid("connect_timeout_ms must be positive"));
        }
        self.reconnect.validate()
    }
}

/// Reconnection strategy as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconnectConfig {
    /// Constant wait, unbounded attempts.
    Fixed {
        #[serde(default = "default_retry_delay_ms")]
        delay_ms: u64,
    },
    /// Doubling wait up to a ceiling, bounded attempts.
    Backoff {
        #[serde(default = "default_backoff_base_ms")]
        base_ms: u64,
        #[serde(default = "default_backoff_cap_ms")]
        cap_ms: u64,
        #[serde(default = "default_backoff_max_attempts")]
        max_attempts: u32,
    },
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::Fixed {
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ReconnectConfig {
    pub fn backoff() -> Self {
        Self::Backoff {
            base_ms: DEFAULT_BACKOFF_BASE_MS,
            cap_ms: DEFAULT_BACKOFF_CAP_MS,
            max_attempts: DEFAULT_BACKOFF_MAX_ATTEMPTS,
        }
    }

    pub fn strategy(&self) -> ReconnectStrategy {
        match *self {
            ReconnectConfig::Fixed { delay_ms } => ReconnectStrategy::Fixed {
                delay: Duration::from_millis(delay_ms),
            },
            ReconnectConfig::Backoff {
                base_ms,
                cap_ms,
                max_attempts,
            } => ReconnectStrategy::Backoff {
                base: Duration::from_millis(base_ms),
                cap: Duration::from_millis(cap_ms),
                max_attempts,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ReconnectConfig::Fixed { delay_ms } => {
                if delay_ms == 0 {
                    return Err(ConfigError::invalid("reconnect.delay_ms must be positive"));
                }
            }
            ReconnectConfig::Backoff {
                base_ms,
                cap_ms,
                max_attempts,
            } => {
                if base_ms == 0 {
                    return Err(ConfigError::invalid("reconnect.base_ms must be positive"));
                }
                if cap_ms < base_ms {
                    return Err(ConfigError::invalid(format!(
                        "reconnect.cap_ms ({cap_ms}) is below reconnect.base_ms ({base_ms})"
                    )));
                }
                if max_attempts == 0 {
                    return Err(ConfigError::invalid("reconnect.max_attempts must be at least 1"));
                }
            }
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_backoff_cap_ms() -> u64 {
    DEFAULT_BACKOFF_CAP_MS
}

fn default_backoff_max_attempts() -> u32 {
    DEFAULT_BACKOFF_MAX_ATTEMPTS
}
