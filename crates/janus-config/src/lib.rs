//! Typed configuration for Janus services.
//!
//! - TOML, JSON and YAML files or strings
//! - Environment variable overrides (`PREFIX__SECTION__KEY`)
//! - Strict sections (unknown fields are rejected) with per-field defaults
//! - Untyped access for component-owned sections ([`RawConfig::scan`])
//!
//! # Example
//!
//! ```no_run
//! use janus_config::ConfigLoader;
//!
//! # fn main() -> Result<(), janus_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("janus.yaml")?
//!     .with_env_prefix("JANUS")
//!     .load()?;
//!
//! println!("HTTP on {}, gRPC on {}", config.server.http.address, config.server.grpc.address);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [service]
//! name = "greeter"
//! version = "1.0.0"
//!
//! [server.http]
//! address = "0.0.0.0:8000"
//! timeout_ms = 1000
//!
//! [server.grpc]
//! address = "0.0.0.0:9000"
//! timeout_ms = 1000
//!
//! [client.http]
//! dial_timeout_ms = 1000
//! request_timeout_ms = 5000
//!
//! [client.grpc]
//! timeout_ms = 500
//! insecure = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/janus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod raw;
mod schema;

pub use config::JanusConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, Format};
pub use raw::{apply_json, apply_toml, apply_yaml, RawConfig};
pub use schema::*;
