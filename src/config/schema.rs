//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket settings.
    pub listener: ListenerConfig,

    /// Per-connection protocol settings.
    pub session: SessionConfig,

    /// Settings of the built-in application.
    pub app: AppConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host name or address to bind, also reported as `SERVER_NAME`.
    pub host: String,

    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrently handled connections (worker pool size).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 256,
        }
    }
}

/// Per-connection protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Receive timeout for inbound reads in seconds; 0 disables it.
    pub receive_timeout_secs: u64,

    /// Answer otherwise-dropped failures with an HTML error page.
    pub debug: bool,

    /// Value of the default `Server` header and `SERVER_SOFTWARE`.
    pub server_identity: String,

    /// Reported URL scheme (`http` or `https` behind a TLS terminator).
    pub url_scheme: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            receive_timeout_secs: 1500,
            debug: false,
            server_identity: format!("qsonac/{}", env!("CARGO_PKG_VERSION")),
            url_scheme: "http".to_string(),
        }
    }
}

/// Built-in application settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Body served by the message application.
    pub message: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            message: "Hello, World!".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight connections after the stop signal.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_secs: 30 }
    }
}
