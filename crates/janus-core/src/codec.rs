//! Content codecs.
//!
//! A [`Codec`] turns a [`serde_json::Value`] into bytes and back for one
//! content type. Typed values go through [`Codec::marshal`] and
//! [`Codec::unmarshal`], which route through the value model so codecs stay
//! object-safe.
//!
//! [`Codecs`] holds the available codecs and implements content
//! negotiation for the HTTP binding:
//!
//! - request bodies are decoded with the codec named by `Content-Type`
//!   (JSON when the header is absent)
//! - responses are encoded with the first supported `Accept` entry, then the
//!   request `Content-Type`, then JSON

use http::header::{ACCEPT, CONTENT_TYPE};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from encoding, decoding or codec selection.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding failed.
    #[error("yaml codec: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No codec is registered for the content type.
    #[error("unsupported content type: {0}")]
    Unsupported(String),
}

/// A content codec.
pub trait Codec: Send + Sync + 'static {
    /// Short codec name, e.g. `json`. Also matched against media subtypes.
    fn name(&self) -> &'static str;

    /// Content type written on encoded bodies.
    fn content_type(&self) -> &'static str;

    /// Encodes a value.
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decodes bytes into a value.
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError>;
}

impl dyn Codec {
    /// Encodes any serializable value.
    pub fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let value = serde_json::to_value(value)?;
        self.encode_value(&value)
    }

    /// Decodes bytes into any deserializable value.
    pub fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        let value = self.decode_value(data)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("name", &self.name())
            .field("content_type", &self.content_type())
            .finish()
    }
}

/// JSON codec (`application/json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// YAML codec (`application/yaml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn content_type(&self) -> &'static str {
        "application/yaml"
    }

    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }

    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_yaml::from_slice(data)?)
    }
}

/// Registry of codecs with content negotiation.
///
/// The first codec is the default. [`Codecs::default`] registers JSON then
/// YAML.
#[derive(Clone)]
pub struct Codecs {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Codecs {
    /// Creates a registry whose default codec is `default`.
    #[must_use]
    pub fn new(default: impl Codec) -> Self {
        Self {
            codecs: vec![Arc::new(default)],
        }
    }

    /// Registers another codec.
    #[must_use]
    pub fn with(mut self, codec: impl Codec) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    /// Returns the default codec.
    #[must_use]
    pub fn default_codec(&self) -> Arc<dyn Codec> {
        Arc::clone(&self.codecs[0])
    }

    /// Looks a codec up by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|codec| codec.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Finds the codec for a media type such as `application/json; charset=utf-8`.
    ///
    /// Structured suffixes (`application/problem+json`) and `x-` subtypes
    /// (`application/x-yaml`) are recognised.
    #[must_use]
    pub fn for_content_type(&self, content_type: &str) -> Option<Arc<dyn Codec>> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let subtype = essence.split_once('/').map_or(essence, |(_, sub)| sub);
        let subtype = subtype.rsplit('+').next().unwrap_or(subtype);
        let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
        self.codecs
            .iter()
            .find(|codec| {
                codec.content_type().eq_ignore_ascii_case(essence)
                    || codec.name().eq_ignore_ascii_case(subtype)
            })
            .cloned()
    }

    /// Selects the codec for decoding a request body.
    ///
    /// Without `Content-Type` the default codec is used.
    pub fn request_codec(&self, headers: &HeaderMap) -> Result<Arc<dyn Codec>, CodecError> {
        let Some(value) = headers.get(CONTENT_TYPE) else {
            return Ok(self.default_codec());
        };
        let content_type = value
            .to_str()
            .map_err(|_| CodecError::Unsupported(String::from_utf8_lossy(value.as_bytes()).into()))?;
        self.for_content_type(content_type)
            .ok_or_else(|| CodecError::Unsupported(content_type.to_string()))
    }

    /// Selects the codec for encoding a response.
    ///
    /// `Accept` entries are tried in order. A wildcard, an absent header or
    /// an empty header falls back to the request codec, then the default.
    /// An `Accept` header naming only unsupported types is an error.
    pub fn response_codec(&self, headers: &HeaderMap) -> Result<Arc<dyn Codec>, CodecError> {
        let fallback = || {
            self.request_codec(headers)
                .unwrap_or_else(|_| self.default_codec())
        };
        let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) else {
            return Ok(fallback());
        };

        let mut wildcard = false;
        let mut any = false;
        for entry in accept.split(',') {
            let media = entry.split(';').next().unwrap_or_default().trim();
            if media.is_empty() {
                continue;
            }
            any = true;
            if media == "*/*" || media.ends_with("/*") {
                wildcard = true;
                continue;
            }
            if let Some(codec) = self.for_content_type(media) {
                return Ok(codec);
            }
        }

        if wildcard || !any {
            Ok(fallback())
        } else {
            Err(CodecError::Unsupported(accept.to_string()))
        }
    }
}

impl Default for Codecs {
    fn default() -> Self {
        Self::new(JsonCodec).with(YamlCodec)
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|codec| codec.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
        count: u32,
    }

    fn headers(pairs: &[(http::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_json_marshal() {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec);
        let bytes = codec
            .marshal(&Greeting {
                name: "janus".into(),
                count: 2,
            })
            .unwrap();
        assert_eq!(bytes, br#"{"count":2,"name":"janus"}"#);
    }

    #[test]
    fn test_yaml_unmarshal() {
        let codec: Arc<dyn Codec> = Arc::new(YamlCodec);
        let greeting: Greeting = codec.unmarshal(b"name: janus\ncount: 3\n").unwrap();
        assert_eq!(greeting.name, "janus");
        assert_eq!(greeting.count, 3);
    }

    #[test]
    fn test_unmarshal_error() {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec);
        let err = codec.unmarshal::<Greeting>(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn test_for_content_type() {
        let codecs = Codecs::default();
        assert_eq!(
            codecs
                .for_content_type("application/json; charset=utf-8")
                .unwrap()
                .name(),
            "json"
        );
        assert_eq!(
            codecs.for_content_type("application/problem+json").unwrap().name(),
            "json"
        );
        assert_eq!(
            codecs.for_content_type("application/x-yaml").unwrap().name(),
            "yaml"
        );
        assert!(codecs.for_content_type("text/html").is_none());
    }

    #[test]
    fn test_request_codec() {
        let codecs = Codecs::default();
        assert_eq!(codecs.request_codec(&HeaderMap::new()).unwrap().name(), "json");
        let yaml = headers(&[(CONTENT_TYPE, "application/yaml")]);
        assert_eq!(codecs.request_codec(&yaml).unwrap().name(), "yaml");
        let xml = headers(&[(CONTENT_TYPE, "application/xml")]);
        assert!(matches!(
            codecs.request_codec(&xml),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn test_response_codec_negotiation() {
        let codecs = Codecs::default();

        let accept = headers(&[(ACCEPT, "text/html, application/yaml;q=0.9")]);
        assert_eq!(codecs.response_codec(&accept).unwrap().name(), "yaml");

        let wildcard = headers(&[(ACCEPT, "*/*"), (CONTENT_TYPE, "application/yaml")]);
        assert_eq!(codecs.response_codec(&wildcard).unwrap().name(), "yaml");

        assert_eq!(codecs.response_codec(&HeaderMap::new()).unwrap().name(), "json");

        let html = headers(&[(ACCEPT, "text/html")]);
        assert!(codecs.response_codec(&html).is_err());
    }

    #[test]
    fn test_by_name() {
        let codecs = Codecs::new(JsonCodec);
        assert!(codecs.by_name("JSON").is_some());
        assert!(codecs.by_name("yaml").is_none());
    }
}
