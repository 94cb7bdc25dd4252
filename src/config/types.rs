//! Core configuration types and loading.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("line {line}: expected `channel <name> <port> <capacity>`")]
    Malformed { line: usize },
    #[error("line {line}: channel name cannot begin with a number: {name}")]
    NameStartsWithDigit { line: usize, name: String },
    #[error("line {line}: channel name cannot contain ':': {name}")]
    InvalidName { line: usize, name: String },
    #[error("line {line}: invalid channel port: {value}")]
    InvalidPort { line: usize, value: String },
    #[error("line {line}: ephemeral ports are invalid: {port}")]
    EphemeralPort { line: usize, port: u16 },
    #[error("line {line}: port out of range: {port}")]
    PortOutOfRange { line: usize, port: u32 },
    #[error("line {line}: invalid channel capacity: {value}")]
    InvalidCapacity { line: usize, value: String },
    #[error("line {line}: duplicate channel name: {name}")]
    DuplicateName { line: usize, name: String },
    #[error("line {line}: duplicate channel port: {port}")]
    DuplicatePort { line: usize, port: u16 },
    #[error("no channels configured")]
    NoChannels,
}

/// Optional runtime settings, loaded from TOML.
///
/// Every field has a default so the daemon runs with only a channel file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channels: ChannelRules,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

/// Listener and session tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address every channel listener binds to (default: 127.0.0.1).
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Seconds an active session may stay silent before it is dropped as AFK (default: 100).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// How often a queued session re-checks admission and reports its position (default: 1000).
    #[serde(default = "default_queue_poll_interval")]
    pub queue_poll_interval_ms: u64,
    /// Largest single read from a client socket (default: 1024).
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Pending deliveries per session before further ones are dropped (default: 64).
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// How long shutdown waits for sessions to flush and close (default: 2000).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
    /// Prometheus metrics HTTP port. Absent or 0 disables the endpoint.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            idle_timeout_secs: default_idle_timeout(),
            queue_poll_interval_ms: default_queue_poll_interval(),
            read_chunk_size: default_read_chunk_size(),
            outbox_capacity: default_outbox_capacity(),
            shutdown_grace_ms: default_shutdown_grace(),
            metrics_port: None,
        }
    }
}

/// Rules applied while reading the channel file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelRules {
    /// Accept any port in 1..=65535 instead of only privileged ports.
    #[serde(default)]
    pub allow_unprivileged_ports: bool,
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_idle_timeout() -> u64 {
    100
}

fn default_queue_poll_interval() -> u64 {
    1000
}

fn default_read_chunk_size() -> usize {
    1024
}

fn default_outbox_capacity() -> usize {
    64
}

fn default_shutdown_grace() -> u64 {
    2000
}
