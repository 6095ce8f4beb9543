//! Layered configuration loader.
//!
//! Layers, later overriding earlier:
//! 1. Built-in defaults
//! 2. A configuration file or string (TOML, JSON or YAML)
//! 3. `PREFIX__SECTION__KEY` environment variables

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, JanusConfig};
use janus_telemetry::LogFormat;

/// Configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// TOML.
    Toml,
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl Format {
    /// Parses a format name or file extension.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Determines the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
    }

    pub(crate) fn parse<T: serde::de::DeserializeOwned>(self, content: &str) -> Result<T, ConfigError> {
        Ok(match self {
            Self::Toml => toml::from_str(content)?,
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
        })
    }
}

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use janus_config::ConfigLoader;
///
/// # fn main() -> Result<(), janus_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("janus.toml")?
///     .with_env_prefix("JANUS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: JanusConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: JanusConfig::default(),
            env_prefix: None,
        }
    }

    /// Loads configuration from a file; the format follows the extension.
    ///
    /// Missing fields keep their defaults; unknown fields are rejected.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let format = Format::from_path(path)
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = format.parse(&content)?;
        Ok(self)
    }

    /// Loads configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the named format.
    ///
    /// # Example
    ///
    /// ```
    /// use janus_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server.http]
    ///     address = "127.0.0.1:3000"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http.address, "127.0.0.1:3000");
    /// assert_eq!(config.server.grpc.address, "0.0.0.0:9000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let format = Format::from_name(format).ok_or_else(|| ConfigError::unsupported_format(format))?;
        self.config = format.parse(content)?;
        Ok(self)
    }

    /// Sets the environment variable prefix for overrides.
    ///
    /// Variables use the form `PREFIX__SECTION__KEY`, for example
    /// `JANUS__SERVER__HTTP__ADDRESS=127.0.0.1:8080`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!("failed to load .env: {e}"))),
        }
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<JanusConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<JanusConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: HashMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVICE", "NAME"] => config.service.name = value.to_string(),
            ["SERVICE", "VERSION"] => config.service.version = value.to_string(),

            ["SERVER", "HTTP", "NETWORK"] => config.server.http.network = value.to_string(),
            ["SERVER", "HTTP", "ADDRESS"] => config.server.http.address = value.to_string(),
            ["SERVER", "HTTP", "TIMEOUT_MS"] => {
                config.server.http.timeout_ms = parse_u64(key, value)?;
            }
            ["SERVER", "GRPC", "NETWORK"] => config.server.grpc.network = value.to_string(),
            ["SERVER", "GRPC", "ADDRESS"] => config.server.grpc.address = value.to_string(),
            ["SERVER", "GRPC", "TIMEOUT_MS"] => {
                config.server.grpc.timeout_ms = parse_u64(key, value)?;
            }

            ["CLIENT", "HTTP", "ENDPOINT"] => config.client.http.endpoint = non_empty(value),
            ["CLIENT", "HTTP", "DIAL_TIMEOUT_MS"] => {
                config.client.http.dial_timeout_ms = parse_u64(key, value)?;
            }
            ["CLIENT", "HTTP", "REQUEST_TIMEOUT_MS"] => {
                config.client.http.request_timeout_ms = parse_u64(key, value)?;
            }
            ["CLIENT", "HTTP", "KEEP_ALIVE_MS"] => {
                config.client.http.keep_alive_ms = parse_u64(key, value)?;
            }
            ["CLIENT", "HTTP", "USER_AGENT"] => config.client.http.user_agent = value.to_string(),
            ["CLIENT", "GRPC", "ENDPOINT"] => config.client.grpc.endpoint = non_empty(value),
            ["CLIENT", "GRPC", "TIMEOUT_MS"] => {
                config.client.grpc.timeout_ms = parse_u64(key, value)?;
            }
            ["CLIENT", "GRPC", "INSECURE"] => {
                config.client.grpc.insecure = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["LOGGING", "ENABLED"] => {
                config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = value.parse::<LogFormat>().map_err(|_| {
                    ConfigError::env_parse_error(key, "expected 'json', 'pretty' or 'compact'")
                })?;
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parses a boolean from a string.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http.address, "0.0.0.0:8000");
        assert_eq!(config.server.grpc.address, "0.0.0.0:9000");
    }

    #[test]
    fn test_with_string_yaml() {
        let yaml = "service:\n  name: greeter\nclient:\n  grpc:\n    timeout_ms: 250\n";
        let config = ConfigLoader::new()
            .with_string(yaml, "yaml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.service.name, "greeter");
        assert_eq!(config.client.grpc.timeout_ms, 250);
        assert_eq!(config.client.http.request_timeout_ms, 5000);
    }

    #[test]
    fn test_with_string_json_unknown_field() {
        let result = ConfigLoader::new().with_string(r#"{"server": {"port": 1}}"#, "json");
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_with_string_unsupported_format() {
        let result = ConfigLoader::new().with_string("a=1", "ini");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_with_file_missing() {
        let result = ConfigLoader::new().with_file("/nonexistent/janus.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_with_optional_file_missing() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/janus.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, JanusConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__HTTP__ADDRESS", "127.0.0.1:8080", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__SERVER__GRPC__TIMEOUT_MS", "3000", "TEST")
            .unwrap();
        assert_eq!(loader.config.server.http.address, "127.0.0.1:8080");
        assert_eq!(loader.config.server.grpc.timeout_ms, 3000);
    }

    #[test]
    fn test_apply_env_var_client() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__CLIENT__GRPC__INSECURE", "false", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__CLIENT__HTTP__ENDPOINT", "http://greeter:8000", "TEST")
            .unwrap();
        assert!(!loader.config.client.grpc.insecure);
        assert_eq!(
            loader.config.client.http.endpoint.as_deref(),
            Some("http://greeter:8000")
        );
    }

    #[test]
    fn test_apply_env_var_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__LOGGING__FORMAT", "compact", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__LOGGING__LEVEL", "debug", "TEST")
            .unwrap();
        assert_eq!(loader.config.logging.format, LogFormat::Compact);
        assert_eq!(loader.config.logging.level, "debug");
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__CLIENT__HTTP__DIAL_TIMEOUT_MS", "soon", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__HTTP__COLOR", "blue", "TEST")
            .unwrap();
        assert_eq!(loader.config, JanusConfig::default());
    }
}
