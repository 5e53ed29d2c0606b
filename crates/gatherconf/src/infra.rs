//! Collector settings - fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network bind address for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to listen on.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for ingest, snapshot and health endpoints.
    /// Default: 8380
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    pub(crate) fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    pub(crate) fn default_http_port() -> u16 {
        8380
    }

    /// `host:port` suitable for `TcpListener::bind`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Collection window timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// How long a snapshot request keeps the session open.
    /// Default: 4000
    #[serde(default = "WindowConfig::default_duration_ms")]
    pub duration_ms: u64,
}

impl WindowConfig {
    pub(crate) fn default_duration_ms() -> u64 {
        4000
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration_ms: Self::default_duration_ms(),
        }
    }
}

/// Logging and trace export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive (trace, debug, info, warn, error, or full EnvFilter syntax).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. When unset, logs go to stderr only.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub(crate) fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: None,
        }
    }
}
