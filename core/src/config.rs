//! Configuration management

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity
    pub server: ServerConfig,
    /// Listener and per-connection settings
    pub connection: ConnectionConfig,
    /// Protocol limits
    pub limits: LimitsConfig,
}

/// Server identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name, used as the prefix of numeric replies
    pub name: String,
    /// Network name shown in the welcome reply
    pub network: String,
    /// Server description
    pub description: String,
    /// Version string reported in RPL_YOURHOST and RPL_MYINFO
    pub version: String,
    /// MOTD file; takes precedence over `motd`
    pub motd_file: Option<String>,
    /// Inline MOTD lines
    pub motd: Vec<String>,
}

/// Listener and per-connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bind address
    pub bind_address: String,
    /// Listening port
    pub port: u16,
    /// Seconds an unregistered connection may stay open
    pub registration_timeout: u64,
    /// Seconds of read inactivity before the server sends PING
    pub ping_interval: u64,
    /// Seconds of read inactivity before the connection is dropped
    pub ping_timeout: u64,
    /// Maximum inbound line length in bytes, CRLF included
    pub max_line_length: usize,
    /// Outbound queue limit in bytes before a slow client is disconnected
    pub sendq_bytes: usize,
    /// Malformed lines tolerated before the connection is dropped
    pub max_violations: u32,
}

/// Protocol limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum nickname length
    pub max_nickname_length: usize,
    /// Maximum channel name length
    pub max_channel_name_length: usize,
    /// Maximum number of channels per client
    pub max_channels_per_client: usize,
    /// Maximum topic length
    pub max_topic_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            network: "GossipNet".to_string(),
            description: "Gossip chat server".to_string(),
            version: format!("gossipd-{}", env!("CARGO_PKG_VERSION")),
            motd_file: None,
            motd: Vec::new(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 6667,
            registration_timeout: 60,
            ping_interval: 90,
            ping_timeout: 240,
            max_line_length: crate::message::MAX_LINE_LENGTH,
            sendq_bytes: 256 * 1024,
            max_violations: 10,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_nickname_length: 30,
            max_channel_name_length: 50,
            max_channels_per_client: 20,
            max_topic_length: 390,
        }
    }
}

impl ConnectionConfig {
    /// Address the listener binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.name.is_empty() {
            return Err(Error::Config("Server name cannot be empty".to_string()));
        }

        if self.server.name.contains(' ') {
            return Err(Error::Config("Server name cannot contain spaces".to_string()));
        }

        if self.connection.port == 0 {
            return Err(Error::Config("Port cannot be 0".to_string()));
        }

        if self.connection.max_line_length < 64 {
            return Err(Error::Config(format!(
                "max_line_length {} is too small (minimum 64)",
                self.connection.max_line_length
            )));
        }

        if self.connection.ping_interval == 0 {
            return Err(Error::Config("ping_interval must be greater than 0".to_string()));
        }

        if self.connection.ping_timeout <= self.connection.ping_interval {
            return Err(Error::Config(
                "ping_timeout must be greater than ping_interval".to_string(),
            ));
        }

        if self.connection.registration_timeout == 0 {
            return Err(Error::Config(
                "registration_timeout must be greater than 0".to_string(),
            ));
        }

        if self.connection.sendq_bytes < self.connection.max_line_length {
            return Err(Error::Config(
                "sendq_bytes must hold at least one full line".to_string(),
            ));
        }

        if self.limits.max_nickname_length == 0 {
            return Err(Error::Config("Max nickname length must be greater than 0".to_string()));
        }

        if self.limits.max_channel_name_length < 2 {
            return Err(Error::Config("Max channel name length must be at least 2".to_string()));
        }

        if self.limits.max_channels_per_client == 0 {
            return Err(Error::Config(
                "Max channels per client must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_topic_length == 0 {
            return Err(Error::Config("Max topic length must be greater than 0".to_string()));
        }

        Ok(())
    }
}
