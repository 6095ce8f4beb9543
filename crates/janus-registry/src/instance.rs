//! Service instances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// One running instance of a service.
///
/// Endpoints are URLs whose scheme names the protocol, e.g.
/// `grpc://127.0.0.1:9000?isSecure=false` or `http://127.0.0.1:8000`.
///
/// ```
/// use janus_registry::ServiceInstance;
///
/// let instance = ServiceInstance::new("greeter-1", "helloworld")
///     .with_version("v1.0.0")
///     .with_endpoint("http://127.0.0.1:8000")
///     .with_endpoint("grpc://127.0.0.1:9000?isSecure=false");
///
/// assert_eq!(instance.endpoint("grpc"), Some("127.0.0.1:9000"));
/// assert!(instance.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique registration id.
    pub id: String,
    /// Service name instances are grouped by.
    pub name: String,
    /// Version of the running build.
    #[serde(default)]
    pub version: String,
    /// Free-form labels.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Reachable endpoints.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl ServiceInstance {
    /// Creates an instance with no version, metadata or endpoints.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            metadata: HashMap::new(),
            endpoints: Vec::new(),
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a metadata label.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Returns the address of the first endpoint using `scheme`, without
    /// scheme or query.
    pub fn endpoint(&self, scheme: &str) -> Option<&str> {
        self.endpoints.iter().find_map(|endpoint| {
            let (found, rest) = endpoint.split_once("://")?;
            if !found.eq_ignore_ascii_case(scheme) {
                return None;
            }
            Some(rest.split(['?', '/']).next().unwrap_or(rest))
        })
    }

    /// Checks that the instance can be registered.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::invalid("id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid("name must not be empty"));
        }
        if let Some(bad) = self.endpoints.iter().find(|e| !e.contains("://")) {
            return Err(RegistryError::invalid(format!("endpoint {bad} has no scheme")));
        }
        Ok(())
    }
}
