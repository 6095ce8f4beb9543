//! Listener configuration shared by the HTTP and gRPC servers.
//!
//! ```
//! use janus_server::ListenConfig;
//! use std::time::Duration;
//!
//! let config = ListenConfig::http()
//!     .with_address("127.0.0.1:3000")
//!     .with_timeout(Duration::from_millis(250));
//!
//! assert_eq!(config.address(), "127.0.0.1:3000");
//! assert_eq!(config.socket_addr().unwrap().port(), 3000);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ServerError;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Default gRPC bind address.
pub const DEFAULT_GRPC_ADDR: &str = "0.0.0.0:9000";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time allowed for in-flight calls after shutdown is triggered.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how a server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    network: String,
    address: String,
    timeout: Duration,
    shutdown_timeout: Duration,
}

impl ListenConfig {
    /// HTTP defaults: `tcp` on `0.0.0.0:8000`, 1s timeout.
    #[must_use]
    pub fn http() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }

    /// gRPC defaults: `tcp` on `0.0.0.0:9000`, 1s timeout.
    #[must_use]
    pub fn grpc() -> Self {
        Self::new(DEFAULT_GRPC_ADDR)
    }

    fn new(address: &str) -> Self {
        Self {
            network: "tcp".to_string(),
            address: address.to_string(),
            timeout: DEFAULT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Sets the network family.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Sets the bind address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns the network family.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Returns the bind address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Resolves the bind address.
    ///
    /// Fails when the network is not `tcp` or the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        if self.network != "tcp" {
            return Err(ServerError::UnsupportedNetwork(self.network.clone()));
        }
        self.address
            .parse()
            .map_err(|e| ServerError::invalid_address(&self.address, e))
    }
}

impl From<&janus_config::HttpServerConfig> for ListenConfig {
    fn from(config: &janus_config::HttpServerConfig) -> Self {
        Self::http()
            .with_network(&config.network)
            .with_address(&config.address)
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }
}

impl From<&janus_config::GrpcServerConfig> for ListenConfig {
    fn from(config: &janus_config::GrpcServerConfig) -> Self {
        Self::grpc()
            .with_network(&config.network)
            .with_address(&config.address)
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let http = ListenConfig::http();
        assert_eq!(http.network(), "tcp");
        assert_eq!(http.address(), DEFAULT_HTTP_ADDR);
        assert_eq!(http.timeout(), Duration::from_secs(1));

        let grpc = ListenConfig::grpc();
        assert_eq!(grpc.address(), DEFAULT_GRPC_ADDR);
        assert_eq!(grpc.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn test_from_loaded_config() {
        let loaded = janus_config::GrpcServerConfig {
            address: "127.0.0.1:9100".to_string(),
            timeout_ms: 300,
            ..Default::default()
        };
        let config = ListenConfig::from(&loaded);
        assert_eq!(config.address(), "127.0.0.1:9100");
        assert_eq!(config.timeout(), Duration::from_millis(300));
    }

    #[test]
    fn test_socket_addr_rejects_unix() {
        let config = ListenConfig::http().with_network("unix");
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn test_socket_addr_rejects_garbage() {
        let config = ListenConfig::http().with_address("not-an-address");
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::InvalidAddress { .. })
        ));
    }
}
