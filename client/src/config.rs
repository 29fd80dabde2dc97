//! Client configuration.

use serde::Deserialize;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Unix socket path, or `host:port` for TCP and TLS.
    pub addr: String,

    /// Per-operation deadline in milliseconds for `dispatch` and `read`.
    /// Zero disables the deadline.
    #[serde(default)]
    pub timeout: i64,
}

impl ClientConfig {
    /// A configuration with no deadline.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: 0,
        }
    }
}
