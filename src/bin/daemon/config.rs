//! Configuration Module
//!
//! This module provides the default settings for the gnmd daemon and loads
//! overrides from a TOML file. Every key is optional; a missing file yields
//! the defaults.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::Result;

/// Constants for default settings
pub const DEFAULT_CONFIG_PATH: &str = "/etc/glassnet.toml";
pub const DEFAULT_RECEIVER_CALLBACK_PORT: u16 = 6060;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;
pub const DEFAULT_MYSQL_HOSTNAME: &str = "localhost";
pub const DEFAULT_MYSQL_DBNAME: &str = "glassnet";
pub const DEFAULT_MYSQL_USERNAME: &str = "gnmd";
pub const DEFAULT_MYSQL_PASSWORD: &str = "letmein";
pub const DEFAULT_MYSQL_MAX_CONNECTIONS: u32 = 4;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Bytes escaped in URL credentials; RFC 3986 unreserved characters pass through
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub mysql: MysqlConfig,
    pub lifecycle: LifecycleConfig,
    pub logging: LoggingConfig,
}

/// Receiver command server settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub receiver_callback_port: u16,
    pub max_line_length: usize,
}

/// Database connection settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MysqlConfig {
    pub hostname: String,
    pub dbname: String,
    pub username: String,
    pub password: String,
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Timer settings for the lifecycle driver
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub tick_interval_ms: u64,
    /// Zero disables the database heartbeat
    pub heartbeat_interval_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            receiver_callback_port: DEFAULT_RECEIVER_CALLBACK_PORT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_MYSQL_HOSTNAME.to_string(),
            dbname: DEFAULT_MYSQL_DBNAME.to_string(),
            username: DEFAULT_MYSQL_USERNAME.to_string(),
            password: DEFAULT_MYSQL_PASSWORD.to_string(),
            url: None,
            max_connections: DEFAULT_MYSQL_MAX_CONNECTIONS,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            path: None,
        }
    }
}

impl Config {
    /// Load the configuration from `path`
    ///
    /// A missing file is not an error and yields [`Config::default`]. Any other
    /// read failure or a malformed file is reported to the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl ServerConfig {
    /// Socket address the command server listens on
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.receiver_callback_port)
    }
}

impl MysqlConfig {
    /// Connection URL for the store
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "mysql://{}:{}@{}/{}",
            utf8_percent_encode(&self.username, USERINFO),
            utf8_percent_encode(&self.password, USERINFO),
            self.hostname,
            self.dbname
        )
    }
}

impl LifecycleConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
