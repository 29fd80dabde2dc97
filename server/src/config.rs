//! Server configuration.
//!
//! A [`ServerConfig`] can be built in code (start from [`ServerConfig::new`]
//! and set fields) or deserialized from TOML with every field beyond the
//! address optional.

use std::path::Path;

use corbel_protocol::Level;
use corbel_protocol::framing::DEFAULT_EOM;
use serde::{Deserialize, Deserializer};

/// Framing discipline used for every connection of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingMode {
    /// Big-endian `u32` length prefix ahead of each payload.
    #[default]
    LengthPrefixed,
    /// Legacy mode: payloads terminated by the configured `eom` bytes.
    Delimited,
}

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Unix socket path, or `host:port` for TCP and TLS.
    pub addr: String,

    /// Per-read deadline in milliseconds. Zero disables the deadline.
    /// Negative selects one-shot mode: the deadline is the absolute value
    /// and the connection closes after its first completed request.
    #[serde(default)]
    pub timeout: i64,

    /// Notification channel capacity, in events.
    #[serde(default = "default_buffer")]
    pub buffer: usize,

    /// End-of-message marker, used only in delimited framing.
    #[serde(default = "default_eom", deserialize_with = "eom_from_string")]
    pub eom: Vec<u8>,

    /// Minimum level an event must have to reach the notification channel.
    #[serde(default, deserialize_with = "level_from_string")]
    pub msglvl: Level,

    /// Maximum request frame length in bytes. Zero is unlimited.
    #[serde(default)]
    pub reqlen: usize,

    /// Framing discipline.
    #[serde(default)]
    pub framing: FramingMode,
}

impl ServerConfig {
    /// A configuration with defaults for everything but the address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: 0,
            buffer: default_buffer(),
            eom: default_eom(),
            msglvl: Level::All,
            reqlen: 0,
            framing: FramingMode::default(),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

fn default_buffer() -> usize {
    32
}

fn default_eom() -> Vec<u8> {
    DEFAULT_EOM.to_vec()
}

fn eom_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    String::deserialize(deserializer).map(String::into_bytes)
}

fn level_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
