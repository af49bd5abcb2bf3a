//! Configuration schema definitions.
//!
//! Every field has a default so a minimal (or empty) file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP/JSON gateway listener.
    pub http: HttpConfig,

    /// Binary RPC listener.
    pub rpc: RpcConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long in-flight requests may run after shutdown begins.
    pub graceful_timeout_ms: u64,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            graceful_timeout_ms: 3_000,
            request_timeout_secs: 30,
            max_body_size: 32 * 1024 * 1024,
        }
    }
}

/// RPC server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    pub max_connections: usize,

    pub graceful_timeout_ms: u64,

    /// Largest accepted frame, in bytes.
    pub max_frame_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9000".to_string(),
            max_connections: 10_000,
            graceful_timeout_ms: 3_000,
            max_frame_size: 4 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
