//! GELF server settings handed to the transport.
//!
//! The `GELF_SINK_*` constants name the environment variables read by
//! [`GelfConfig::from_env`]; the stream itself never reads them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Graylog hostname or IP address.
pub const GELF_SINK_HOST_ENV: &str = "GELF_SINK_HOST";

/// Graylog GELF UDP input port.
pub const GELF_SINK_PORT_ENV: &str = "GELF_SINK_PORT";

/// `wan` or `lan`.
pub const GELF_SINK_CONNECTION_ENV: &str = "GELF_SINK_CONNECTION";

pub const GELF_SINK_MAX_CHUNK_SIZE_WAN_ENV: &str = "GELF_SINK_MAX_CHUNK_SIZE_WAN";

pub const GELF_SINK_MAX_CHUNK_SIZE_LAN_ENV: &str = "GELF_SINK_MAX_CHUNK_SIZE_LAN";

/// Bytes taken by the header of a chunked GELF datagram. A usable chunk
/// size must leave room for at least one payload byte after it.
pub const GELF_CHUNK_HEADER_LEN: usize = 12;

/// Network class of the path to the GELF server, which decides the
/// datagram size the transport may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    #[default]
    Wan,
    Lan,
}

impl FromStr for ConnectionClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wan" => Ok(ConnectionClass::Wan),
            "lan" => Ok(ConnectionClass::Lan),
            _ => Err(ConfigError::InvalidConnection(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionClass::Wan => f.write_str("wan"),
            ConnectionClass::Lan => f.write_str("lan"),
        }
    }
}

/// Where and how to send GELF datagrams.
///
/// Only the transport interprets these values.
///
/// **Fields**
/// - `graylog_hostname`: GELF server host name or IP address.
/// - `graylog_port`: GELF UDP input port.
/// - `connection`: selects which of the two chunk sizes applies.
/// - `max_chunk_size_wan` / `max_chunk_size_lan`: largest datagram, in
///   bytes, for each connection class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GelfConfig {
    pub graylog_hostname: String,
    pub graylog_port: u16,
    pub connection: ConnectionClass,
    pub max_chunk_size_wan: usize,
    pub max_chunk_size_lan: usize,
}

impl Default for GelfConfig {
    fn default() -> Self {
        Self {
            graylog_hostname: "127.0.0.1".to_string(),
            graylog_port: 12201,
            connection: ConnectionClass::Wan,
            max_chunk_size_wan: 1420,
            max_chunk_size_lan: 8154,
        }
    }
}

impl GelfConfig {
    /// Datagram size limit for the configured connection class.
    pub fn max_chunk_size(&self) -> usize {
        match self.connection {
            ConnectionClass::Wan => self.max_chunk_size_wan,
            ConnectionClass::Lan => self.max_chunk_size_lan,
        }
    }

    /// `host:port` of the GELF server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.graylog_hostname, self.graylog_port)
    }

    /// Build a config from `GELF_SINK_*` environment variables, using the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GelfConfig::default();
        if let Some(host) = lookup(GELF_SINK_HOST_ENV) {
            config.graylog_hostname = host;
        }
        if let Some(port) = lookup(GELF_SINK_PORT_ENV) {
            config.graylog_port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        if let Some(connection) = lookup(GELF_SINK_CONNECTION_ENV) {
            config.connection = connection.parse()?;
        }
        if let Some(size) = lookup(GELF_SINK_MAX_CHUNK_SIZE_WAN_ENV) {
            config.max_chunk_size_wan = parse_chunk_size(&size)?;
        }
        if let Some(size) = lookup(GELF_SINK_MAX_CHUNK_SIZE_LAN_ENV) {
            config.max_chunk_size_lan = parse_chunk_size(&size)?;
        }
        Ok(config)
    }
}

fn parse_chunk_size(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(size) if size > GELF_CHUNK_HEADER_LEN => Ok(size),
        _ => Err(ConfigError::InvalidChunkSize(raw.to_string())),
    }
}
