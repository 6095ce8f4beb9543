//! Configuration schema types.
//!
//! Every section rejects unknown fields and fills missing ones with the
//! defaults below.

use janus_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

/// Service identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name, used in logs and registry entries.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Service version.
    #[serde(default = "default_service_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
        }
    }
}

fn default_service_name() -> String {
    "janus-service".to_string()
}

fn default_service_version() -> String {
    "0.0.0".to_string()
}

/// HTTP server listener.
///
/// # Example
///
/// ```
/// use janus_config::HttpServerConfig;
///
/// let config = HttpServerConfig::default();
/// assert_eq!(config.address, "0.0.0.0:8000");
/// assert_eq!(config.timeout_ms, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HttpServerConfig {
    /// Network family; only `tcp` is supported.
    #[serde(default = "default_network")]
    pub network: String,

    /// Bind address.
    #[serde(default = "default_http_address")]
    pub address: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_server_timeout")]
    pub timeout_ms: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            address: default_http_address(),
            timeout_ms: default_server_timeout(),
        }
    }
}

/// gRPC server listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GrpcServerConfig {
    /// Network family; only `tcp` is supported.
    #[serde(default = "default_network")]
    pub network: String,

    /// Bind address.
    #[serde(default = "default_grpc_address")]
    pub address: String,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_server_timeout")]
    pub timeout_ms: u64,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            address: default_grpc_address(),
            timeout_ms: default_server_timeout(),
        }
    }
}

fn default_network() -> String {
    "tcp".to_string()
}

fn default_http_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_grpc_address() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_server_timeout() -> u64 {
    1000
}

/// Server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP listener.
    #[serde(default)]
    pub http: HttpServerConfig,

    /// gRPC listener.
    #[serde(default)]
    pub grpc: GrpcServerConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Target base URL, e.g. `http://127.0.0.1:8000`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_ms: u64,

    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Idle keep-alive in milliseconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_ms: u64,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            dial_timeout_ms: default_dial_timeout(),
            request_timeout_ms: default_request_timeout(),
            keep_alive_ms: default_keep_alive(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_dial_timeout() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_keep_alive() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("janus/", env!("CARGO_PKG_VERSION")).to_string()
}

/// gRPC client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GrpcClientConfig {
    /// Target, e.g. `127.0.0.1:9000` or `http://127.0.0.1:9000`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_grpc_client_timeout")]
    pub timeout_ms: u64,

    /// Use plaintext HTTP/2 instead of TLS.
    #[serde(default = "default_true")]
    pub insecure: bool,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_grpc_client_timeout(),
            insecure: true,
        }
    }
}

fn default_grpc_client_timeout() -> u64 {
    500
}

/// Client section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// HTTP client.
    #[serde(default)]
    pub http: HttpClientConfig,

    /// gRPC client.
    #[serde(default)]
    pub grpc: GrpcClientConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Builds the subscriber configuration for this section.
    #[must_use]
    pub fn to_log_config(&self, service_name: &str) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            ..LogConfig::default()
        }
        .with_service_name(service_name)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
