//! Structured logging for Janus services.
//!
//! Janus emits all diagnostics as `tracing` events. This crate installs a
//! `tracing-subscriber` pipeline for them: an [`EnvFilter`] built from the
//! configured level and a `fmt` layer producing JSON (production), pretty
//! (development) or compact output.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production().with_service_name("greeter"))?;
//! tracing::info!(system = "http", "listening");
//! ```
//!
//! [`EnvFilter`]: tracing_subscriber::EnvFilter

#![doc(html_root_url = "https://docs.rs/janus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
