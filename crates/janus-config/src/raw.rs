//! Untyped configuration access.
//!
//! Components that own their configuration shape read it from an arbitrary
//! document instead of from [`JanusConfig`](crate::JanusConfig). The
//! `apply_*` functions deserialize a whole document into any type (unknown
//! fields are allowed unless the type forbids them); [`RawConfig`] keeps a
//! parsed document and scans sub-trees by dotted path.

use crate::loader::Format;
use crate::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Deserializes a JSON document into `T`.
pub fn apply_json<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Format::Json.parse(content)
}

/// Deserializes a YAML document into `T`.
pub fn apply_yaml<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Format::Yaml.parse(content)
}

/// Deserializes a TOML document into `T`.
pub fn apply_toml<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Format::Toml.parse(content)
}

/// A parsed configuration document.
///
/// # Example
///
/// ```
/// use janus_config::{HttpServerConfig, RawConfig};
///
/// let raw = RawConfig::parse("[server.http]\naddress = \"127.0.0.1:8080\"\n", "toml").unwrap();
/// let http: HttpServerConfig = raw.scan("server.http").unwrap();
/// assert_eq!(http.address, "127.0.0.1:8080");
/// assert_eq!(http.timeout_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfig {
    root: Value,
}

impl RawConfig {
    /// Parses a document in the named format.
    pub fn parse(content: &str, format: &str) -> Result<Self, ConfigError> {
        let format = Format::from_name(format).ok_or_else(|| ConfigError::unsupported_format(format))?;
        Ok(Self {
            root: format.parse(content)?,
        })
    }

    /// Reads and parses a file; the format follows the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let format = Format::from_path(path)
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        Ok(Self {
            root: format.parse(&content)?,
        })
    }

    /// Returns the value at a dotted path, e.g. `client.grpc.timeout_ms`.
    ///
    /// The empty path is the document root.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.')
            .try_fold(&self.root, |node, key| node.as_object()?.get(key))
    }

    /// Deserializes the sub-tree at a dotted path into `T`.
    pub fn scan<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self.get(path).ok_or_else(|| ConfigError::missing_field(path))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}
