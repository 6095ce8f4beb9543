//! Registry errors.

use janus_core::StatusError;
use thiserror::Error;

/// Errors returned by registrars, discoveries and watchers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The instance failed validation.
    #[error("invalid service instance: {reason}")]
    InvalidInstance {
        /// What is wrong with it.
        reason: String,
    },

    /// No instance with this id is registered under the service name.
    #[error("service instance {id} of {name} is not registered")]
    NotRegistered {
        /// Service name.
        name: String,
        /// Instance id.
        id: String,
    },

    /// The watcher was stopped.
    #[error("watcher stopped")]
    WatcherStopped,

    /// The caller's context was cancelled or its deadline passed.
    #[error("watch abandoned: {0}")]
    Done(StatusError),

    /// The registry backing the watcher is gone.
    #[error("registry closed")]
    Closed,
}

impl RegistryError {
    /// Creates an invalid instance error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInstance { reason: reason.into() }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
