//! Client error types.

use janus_core::{CodecError, StatusError};
use thiserror::Error;

/// Errors surfaced by the HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call failed with a structured error, decoded from the response
    /// or produced locally (deadline, recovered panic).
    #[error(transparent)]
    Status(StatusError),

    /// A failed response carried a body that could not be decoded.
    #[error("failed to decode error response with status {status}: {source}")]
    Decode {
        /// HTTP status of the response.
        status: u16,
        /// Codec failure.
        #[source]
        source: CodecError,
    },

    /// Encoding the request or decoding the reply failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The HTTP exchange itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gRPC channel could not be established.
    #[error("grpc channel error: {0}")]
    Channel(#[from] tonic::transport::Error),

    /// No endpoint was configured.
    #[error("missing endpoint")]
    MissingEndpoint,

    /// The endpoint could not be parsed.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ClientError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns the structured error, if the call produced one.
    #[must_use]
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            Self::Status(status) => Some(status),
            _ => None,
        }
    }

    /// Converts into a structured error.
    ///
    /// Errors without a structured form become `Unknown`.
    #[must_use]
    pub fn into_status(self) -> StatusError {
        match self {
            Self::Status(status) => status,
            other => StatusError::from_error(&other),
        }
    }
}

impl From<StatusError> for ClientError {
    fn from(status: StatusError) -> Self {
        Self::Status(status)
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
