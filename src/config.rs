//! Configuration module for roomchat.

use serde::Deserialize;
use std::path::Path;

use crate::chat::{DEFAULT_HISTORY_LIMIT, DEFAULT_ROOMS, DEFAULT_WELCOME_TEXT};
use crate::{ChatError, Result};

/// Line-based TCP (Telnet) server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle timeout in seconds (0 = never disconnect idle clients).
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2323
}

fn default_max_connections() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            idle_timeout_secs: 0,
        }
    }
}

/// SSH server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    /// Whether the SSH server is enabled.
    #[serde(default = "default_ssh_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Path of the host key (generated on first start).
    #[serde(default = "default_host_key_path")]
    pub host_key_path: String,
    /// Maximum number of concurrent SSH connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_ssh_enabled() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    2222
}

fn default_host_key_path() -> String {
    "data/ssh_host_key".to_string()
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: default_ssh_enabled(),
            host: default_host(),
            port: default_ssh_port(),
            host_key_path: default_host_key_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Chat room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Rooms created on startup, in display order.
    #[serde(default = "default_seed_rooms")]
    pub seed_rooms: Vec<String>,
    /// Messages retained per room for replay to joiners.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Capacity of each connection's outbound queue, in lines.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Welcome line sent by a room to each joiner.
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
    /// Tell room members when someone joins or leaves.
    #[serde(default)]
    pub announce_presence: bool,
    /// Maximum chat message length, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_seed_rooms() -> Vec<String> {
    DEFAULT_ROOMS.iter().map(|s| s.to_string()).collect()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_welcome_text() -> String {
    DEFAULT_WELCOME_TEXT.to_string()
}

fn default_max_message_length() -> usize {
    500
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            seed_rooms: default_seed_rooms(),
            history_limit: default_history_limit(),
            outbox_capacity: default_outbox_capacity(),
            welcome_text: default_welcome_text(),
            announce_presence: false,
            max_message_length: default_max_message_length(),
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
    "logs/roomchat.log".to_string()
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
    /// TCP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// SSH server configuration.
    #[serde(default)]
    pub ssh: SshConfig,
    /// Chat room configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ChatError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ROOMCHAT_PORT`: Override the TCP port
    /// - `ROOMCHAT_SSH_PORT`: Override the SSH port
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(port) = port_from_env("ROOMCHAT_PORT")? {
            self.server.port = port;
        }
        if let Some(port) = port_from_env("ROOMCHAT_SSH_PORT")? {
            self.ssh.port = port;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `chat.history_limit` or `chat.max_message_length` is zero
    /// - `chat.outbox_capacity` cannot hold a welcome line plus a full replay
    /// - a connection limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.chat.history_limit == 0 {
            return Err(ChatError::Config(
                "chat.history_limit must be at least 1".to_string(),
            ));
        }
        if self.chat.outbox_capacity <= self.chat.history_limit + 1 {
            return Err(ChatError::Config(format!(
                "chat.outbox_capacity ({}) must exceed chat.history_limit + 1 ({})",
                self.chat.outbox_capacity,
                self.chat.history_limit + 1
            )));
        }
        if self.chat.max_message_length == 0 {
            return Err(ChatError::Config(
                "chat.max_message_length must be at least 1".to_string(),
            ));
        }
        if self.server.max_connections == 0 || self.ssh.max_connections == 0 {
            return Err(ChatError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn port_from_env(var: &str) -> Result<Option<u16>> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ChatError::Config(format!("{var} is not a valid port: {value}"))),
        _ => Ok(None),
    }
}
