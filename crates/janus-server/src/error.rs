//! Server error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised while building or running a server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The configured address.
        address: String,
        /// Parse failure.
        reason: String,
    },

    /// The configured network is not supported.
    #[error("unsupported network '{0}', expected 'tcp'")]
    UnsupportedNetwork(String),

    /// Binding the listener failed.
    #[error("failed to bind to {addr}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A route could not be registered.
    #[error("invalid route {method} {path}: {reason}")]
    Route {
        /// Route method.
        method: String,
        /// Route path template.
        path: String,
        /// Why the route was rejected.
        reason: String,
    },

    /// The gRPC transport failed.
    #[error("gRPC transport error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// An I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A server task ended abnormally.
    #[error("server task failed: {0}")]
    Task(String),
}

impl ServerError {
    /// Creates an invalid address error.
    pub fn invalid_address(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a route registration error.
    pub fn route(method: impl ToString, path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Route {
            method: method.to_string(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_display() {
        let err = ServerError::invalid_address("nowhere", "invalid socket address syntax");
        assert_eq!(
            err.to_string(),
            "invalid address 'nowhere': invalid socket address syntax"
        );
    }

    #[test]
    fn test_route_display() {
        let err = ServerError::route(http::Method::GET, "/a/{b}", "conflict");
        assert_eq!(err.to_string(), "invalid route GET /a/{b}: conflict");
    }

    #[test]
    fn test_bind_has_source() {
        use std::error::Error;
        let err = ServerError::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.source().is_some());
    }
}
