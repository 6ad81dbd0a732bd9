//! Client configuration.
//!
//! The backend address is passed in explicitly; nothing reads the process
//! environment unless the caller asks for `ClientConfig::from_env`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin (optionally with a path prefix) every request path is joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AGENTA_API_URL` | Backend base URL |
    /// | `AGENTA_TIMEOUT_SECS` | Per-request timeout |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("AGENTA_API_URL").unwrap_or_else(|_| default_base_url()),
            timeout_secs: std::env::var("AGENTA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
        }
    }
}
