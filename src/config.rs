//! Configuration module for roomcast.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;

use crate::{Result, RoomcastError};

/// Directory server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent control connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_max_connections() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

/// Room allocation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Base multicast address. The n-th room gets `group_base + n`.
    #[serde(default = "default_group_base")]
    pub group_base: Ipv4Addr,
    /// Number of group addresses available above `group_base`.
    #[serde(default = "default_group_capacity")]
    pub group_capacity: u32,
    /// Base UDP port. A room's port is `base_port + id`.
    #[serde(default = "default_base_port")]
    pub base_port: u16,
}

fn default_group_base() -> Ipv4Addr {
    Ipv4Addr::new(230, 0, 0, 0)
}

fn default_group_capacity() -> u32 {
    255
}

fn default_base_port() -> u16 {
    5000
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            group_base: default_group_base(),
            group_capacity: default_group_capacity(),
            base_port: default_base_port(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Directory server host.
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// Directory server port.
    #[serde(default = "default_port")]
    pub server_port: u16,
    /// Upper bound for waiting on a reply, in seconds (0 = wait forever).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Display name to use instead of prompting.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl ClientConfig {
    /// The directory server address as `host:port`.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_port(),
            request_timeout_secs: default_request_timeout(),
            user: None,
        }
    }
}

/// Chat transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Local interface used for multicast group membership.
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
    /// Receive buffer size in bytes. Longer datagrams are truncated.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Prefix marking system lines.
    #[serde(default = "default_system_tag")]
    pub system_tag: String,
    /// Multicast TTL for outgoing datagrams.
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_buffer_size() -> usize {
    4096
}

fn default_system_tag() -> String {
    "[SYSTEM]:".to_string()
}

fn default_multicast_ttl() -> u32 {
    1
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            buffer_size: default_buffer_size(),
            system_tag: default_system_tag(),
            multicast_ttl: default_multicast_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/roomcast.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Directory server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Room allocation configuration.
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Client configuration.
    #[serde(default)]
    pub client: ClientConfig,
    /// Chat transport configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RoomcastError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RoomcastError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ROOMCAST_SERVER`: directory address for the client, as `host:port` or `host`
    /// - `ROOMCAST_USER`: display name for the client
    pub fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var("ROOMCAST_SERVER") {
            self.apply_server_override(&server);
        }
        if let Ok(user) = std::env::var("ROOMCAST_USER") {
            if !user.is_empty() {
                self.client.user = Some(user);
            }
        }
    }

    fn apply_server_override(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match value.rsplit_once(':') {
            Some((host, port)) => {
                if let Ok(port) = port.parse() {
                    self.client.server_host = host.to_string();
                    self.client.server_port = port;
                }
            }
            None => self.client.server_host = value.to_string(),
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `server.max_connections` is zero
    /// - `rooms.group_base` is not a multicast address
    /// - `rooms.group_capacity` or `chat.buffer_size` is zero
    /// - `client.user` is set but cannot travel as a single protocol field
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(RoomcastError::Validation(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if !self.rooms.group_base.is_multicast() {
            return Err(RoomcastError::Validation(format!(
                "rooms.group_base {} is not a multicast address",
                self.rooms.group_base
            )));
        }
        if self.rooms.group_capacity == 0 {
            return Err(RoomcastError::Validation(
                "rooms.group_capacity must be at least 1".to_string(),
            ));
        }
        if self.chat.buffer_size == 0 {
            return Err(RoomcastError::Validation(
                "chat.buffer_size must be at least 1".to_string(),
            ));
        }
        if let Some(user) = &self.client.user {
            crate::protocol::validate_token("client.user", user)?;
        }
        Ok(())
    }
}
