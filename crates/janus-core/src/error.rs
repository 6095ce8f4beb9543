//! Structured error model.
//!
//! Every failure that crosses a transport boundary in Janus is a
//! [`StatusError`]: a numeric [`Code`] from the canonical gRPC code space, a
//! stable machine-readable `reason`, and a human-readable `message`.
//!
//! # Code mapping
//!
//! | Code | Name | HTTP |
//! |---|---|---|
//! | 0 | `Ok` | 200 |
//! | 1 | `Canceled` | 499 |
//! | 2 | `Unknown` | 500 |
//! | 3 | `InvalidArgument` | 400 |
//! | 4 | `DeadlineExceeded` | 504 |
//! | 5 | `NotFound` | 404 |
//! | 6 | `AlreadyExists` | 409 |
//! | 7 | `PermissionDenied` | 403 |
//! | 8 | `ResourceExhausted` | 429 |
//! | 9 | `FailedPrecondition` | 400 |
//! | 10 | `Aborted` | 409 |
//! | 11 | `OutOfRange` | 400 |
//! | 12 | `Unimplemented` | 501 |
//! | 13 | `Internal` | 500 |
//! | 14 | `Unavailable` | 503 |
//! | 15 | `DataLoss` | 500 |
//! | 16 | `Unauthenticated` | 401 |
//!
//! Codes outside this table map to HTTP 500.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type-erased error returned by handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`StatusError`].
pub type JanusResult<T> = Result<T, StatusError>;

/// Reason used when a fault or a non-structured error is classified.
pub const UNKNOWN_REASON: &str = "Unknown";

/// Status code used by HTTP clients that closed the request.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Canonical status codes.
///
/// Values are identical to the gRPC canonical codes so that a code can be put
/// on the wire unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Code {
    /// Not an error; returned on success.
    Ok = 0,
    /// The operation was cancelled, typically by the caller.
    Canceled = 1,
    /// Unknown error, or an error without enough information to classify it.
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// Some requested entity was not found.
    NotFound = 5,
    /// The entity a client attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the operation.
    PermissionDenied = 7,
    /// Some resource has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation.
    FailedPrecondition = 9,
    /// The operation was aborted, typically due to a concurrency issue.
    Aborted = 10,
    /// The operation was attempted past the valid range.
    OutOfRange = 11,
    /// The operation is not implemented or not supported.
    Unimplemented = 12,
    /// Internal invariants were broken.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    /// Converts a raw code into a canonical [`Code`].
    ///
    /// Returns `None` for values outside the canonical set.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        let code = match value {
            0 => Self::Ok,
            1 => Self::Canceled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Returns the raw numeric value of this code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns the canonical name of this code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::OutOfRange => "OutOfRange",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::DataLoss => "DataLoss",
            Self::Unauthenticated => "Unauthenticated",
        }
    }

    /// Returns the HTTP status this code maps to.
    #[must_use]
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::Canceled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Unknown | Self::Internal | Self::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidArgument | Self::FailedPrecondition | Self::OutOfRange => {
                StatusCode::BAD_REQUEST
            }
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::Aborted => StatusCode::CONFLICT,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Self::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    /// Returns all canonical codes in numeric order.
    #[must_use]
    pub const fn all() -> [Code; 17] {
        [
            Self::Ok,
            Self::Canceled,
            Self::Unknown,
            Self::InvalidArgument,
            Self::DeadlineExceeded,
            Self::NotFound,
            Self::AlreadyExists,
            Self::PermissionDenied,
            Self::ResourceExhausted,
            Self::FailedPrecondition,
            Self::Aborted,
            Self::OutOfRange,
            Self::Unimplemented,
            Self::Internal,
            Self::Unavailable,
            Self::DataLoss,
            Self::Unauthenticated,
        ]
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        code.as_i32()
    }
}

/// Maps a raw code to an HTTP status.
///
/// Total over `i32`: codes outside the canonical set map to
/// `500 Internal Server Error`.
#[must_use]
pub fn http_status_for(code: i32) -> StatusCode {
    Code::from_i32(code).map_or(StatusCode::INTERNAL_SERVER_ERROR, Code::http_status)
}

/// The structured `(code, reason, message)` error.
///
/// `StatusError` is a plain value: it is serialized as-is into HTTP error
/// bodies and carried losslessly in gRPC status details.
///
/// # Example
///
/// ```
/// use janus_core::{Code, StatusError};
///
/// let err = StatusError::invalid_argument("BadRequest", "invalid argument x");
/// assert_eq!(err.code, 3);
/// assert!(err.is(Code::InvalidArgument));
/// assert_eq!(err.http_status().as_u16(), 400);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[error("error: code = {code} reason = {reason} message = {message}")]
pub struct StatusError {
    /// Canonical status code.
    pub code: i32,
    /// Stable machine-readable reason.
    #[serde(default)]
    pub reason: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

macro_rules! status_constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)*) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name(reason: impl Into<String>, message: impl Into<String>) -> Self {
                Self::new(Code::$code, reason, message)
            }
        )*
    };
}

impl StatusError {
    /// Creates a new error with a canonical code.
    #[must_use]
    pub fn new(code: Code, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_raw(code.as_i32(), reason, message)
    }

    /// Creates a new error from a raw numeric code.
    ///
    /// Used when reconstructing an error received from the wire, where the
    /// code may lie outside the canonical set.
    #[must_use]
    pub fn from_raw(code: i32, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    status_constructors! {
        /// Creates a `Canceled` error.
        canceled => Canceled;
        /// Creates an `Unknown` error.
        unknown => Unknown;
        /// Creates an `InvalidArgument` error.
        invalid_argument => InvalidArgument;
        /// Creates a `DeadlineExceeded` error.
        deadline_exceeded => DeadlineExceeded;
        /// Creates a `NotFound` error.
        not_found => NotFound;
        /// Creates an `AlreadyExists` error.
        already_exists => AlreadyExists;
        /// Creates a `PermissionDenied` error.
        permission_denied => PermissionDenied;
        /// Creates a `ResourceExhausted` error.
        resource_exhausted => ResourceExhausted;
        /// Creates a `FailedPrecondition` error.
        failed_precondition => FailedPrecondition;
        /// Creates an `Aborted` error.
        aborted => Aborted;
        /// Creates an `OutOfRange` error.
        out_of_range => OutOfRange;
        /// Creates an `Unimplemented` error.
        unimplemented => Unimplemented;
        /// Creates an `Internal` error.
        internal => Internal;
        /// Creates an `Unavailable` error.
        unavailable => Unavailable;
        /// Creates a `DataLoss` error.
        data_loss => DataLoss;
        /// Creates an `Unauthenticated` error.
        unauthenticated => Unauthenticated;
    }

    /// Classifies an arbitrary error.
    ///
    /// A `StatusError` is returned unchanged. Anything else becomes
    /// `Unknown` with reason `"Unknown"` and the original error text in the
    /// message, so every error has a structured form.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        match err.downcast_ref::<Self>() {
            Some(status) => status.clone(),
            None => Self::unknown(UNKNOWN_REASON, format!("{UNKNOWN_REASON}: {err}")),
        }
    }

    /// Classifies a boxed error, reusing the allocation when it already is a
    /// `StatusError`.
    #[must_use]
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<Self>() {
            Ok(status) => *status,
            Err(other) => Self::from_error(other.as_ref()),
        }
    }

    /// Returns the canonical code, or [`Code::Unknown`] for unmapped values.
    #[must_use]
    pub fn canonical(&self) -> Code {
        Code::from_i32(self.code).unwrap_or(Code::Unknown)
    }

    /// Returns `true` if this error carries the given code.
    #[must_use]
    pub fn is(&self, code: Code) -> bool {
        self.code == code.as_i32()
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        http_status_for(self.code)
    }

    /// Returns `true` when the reason is missing.
    ///
    /// Degraded errors are produced when a native error arrives without a
    /// reason detail attached.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.reason.is_empty()
    }
}
