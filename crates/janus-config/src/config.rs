//! Root configuration type.

use crate::{ClientSection, ConfigError, LoggingConfig, ServerSection, ServiceConfig};
use janus_telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Complete Janus service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use janus_config::JanusConfig;
///
/// let config = JanusConfig::default();
/// assert_eq!(config.server.http.address, "0.0.0.0:8000");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct JanusConfig {
    /// Service identity.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Server listeners.
    #[serde(default)]
    pub server: ServerSection,

    /// Outbound clients.
    #[serde(default)]
    pub client: ClientSection,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl JanusConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when:
    /// - the service name is empty
    /// - a listener network is not `tcp` or its address is not a socket address
    /// - a timeout is zero
    /// - the log level is not a valid filter directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::invalid_value("service.name", "must not be empty"));
        }

        validate_listener("server.http", &self.server.http.network, &self.server.http.address)?;
        validate_listener("server.grpc", &self.server.grpc.network, &self.server.grpc.address)?;

        let timeouts = [
            ("server.http.timeout_ms", self.server.http.timeout_ms),
            ("server.grpc.timeout_ms", self.server.grpc.timeout_ms),
            ("client.http.dial_timeout_ms", self.client.http.dial_timeout_ms),
            ("client.http.request_timeout_ms", self.client.http.request_timeout_ms),
            ("client.grpc.timeout_ms", self.client.grpc.timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        if self.logging.enabled {
            janus_telemetry::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Returns the subscriber configuration derived from this config.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        self.logging.to_log_config(&self.service.name)
    }
}

fn validate_listener(section: &str, network: &str, address: &str) -> Result<(), ConfigError> {
    if network != "tcp" {
        return Err(ConfigError::invalid_value(
            format!("{section}.network"),
            format!("unsupported network '{network}', expected 'tcp'"),
        ));
    }
    if address.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::invalid_value(
            format!("{section}.address"),
            format!("invalid socket address: {address}"),
        ));
    }
    Ok(())
}
