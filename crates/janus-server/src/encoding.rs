//! HTTP request decoding and response encoding.
//!
//! The HTTP server delegates three steps to pluggable encoders:
//!
//! | Step | Trait | Default |
//! |------|-------|---------|
//! | request → value | [`RequestDecoder`] | [`DefaultRequestDecoder`] |
//! | reply → response | [`ResponseEncoder`] | [`DefaultResponseEncoder`] |
//! | error → response | [`ErrorEncoder`] | [`DefaultErrorEncoder`] |
//!
//! Decoders work on `serde_json::Value`; the typed route turns the value
//! into its request type and its reply back into a value.

use std::error::Error;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use janus_core::{Codecs, RequestHead, StatusError};
use serde_json::{Map, Value};

/// HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// HTTP response produced by the server.
pub type HttpResponse = Response<ResponseBody>;

/// An inbound request after routing.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    /// Request line and headers.
    pub head: &'a RequestHead,
    /// Path parameters captured by the route, in template order.
    pub params: &'a [(String, String)],
    /// Request body.
    pub body: &'a [u8],
}

/// Decodes a request into a value.
pub trait RequestDecoder: Send + Sync + 'static {
    /// Decodes `request`.
    fn decode(&self, request: InboundRequest<'_>, codecs: &Codecs) -> Result<Value, StatusError>;
}

/// Encodes a successful reply.
pub trait ResponseEncoder: Send + Sync + 'static {
    /// Encodes `reply` for the request described by `head`.
    fn encode(&self, head: &RequestHead, reply: &Value, codecs: &Codecs) -> Result<HttpResponse, StatusError>;
}

/// Encodes a failed call. Infallible: the result is always a response.
pub trait ErrorEncoder: Send + Sync + 'static {
    /// Encodes `err` for the request described by `head`.
    fn encode(&self, head: &RequestHead, err: &(dyn Error + Send + Sync + 'static), codecs: &Codecs) -> HttpResponse;
}

/// Merges query parameters, path parameters and the body into one object.
///
/// Later sources win on key collisions. Query and path values are strings.
/// A non-object body is returned as is when there are no parameters.
///
/// | Failure | Error |
/// |---------|-------|
/// | malformed query | `InvalidArgument("CodecUnmarshal")` |
/// | unknown `Content-Type` | `InvalidArgument("CodecUnsupported")` |
/// | undecodable body | `InvalidArgument("CodecUnmarshal")` |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestDecoder;

impl RequestDecoder for DefaultRequestDecoder {
    fn decode(&self, request: InboundRequest<'_>, codecs: &Codecs) -> Result<Value, StatusError> {
        let mut merged = Map::new();

        if let Some(query) = request.head.query() {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
                .map_err(|e| StatusError::invalid_argument("CodecUnmarshal", e.to_string()))?;
            merged.extend(pairs.into_iter().map(|(k, v)| (k, Value::String(v))));
        }
        merged.extend(
            request
                .params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
        );

        if request.body.is_empty() {
            return Ok(Value::Object(merged));
        }

        let codec = codecs
            .request_codec(&request.head.headers)
            .map_err(|e| StatusError::invalid_argument("CodecUnsupported", e.to_string()))?;
        let body = codec
            .decode_value(request.body)
            .map_err(|e| StatusError::invalid_argument("CodecUnmarshal", e.to_string()))?;

        match body {
            Value::Object(fields) => {
                merged.extend(fields);
                Ok(Value::Object(merged))
            }
            other if merged.is_empty() => Ok(other),
            _ => Err(StatusError::invalid_argument(
                "CodecUnmarshal",
                "request body must be an object when the request carries parameters",
            )),
        }
    }
}

/// Encodes the reply with the negotiated codec and sets `content-type`.
///
/// The codec is chosen from `Accept`, then the request `Content-Type`, then
/// the default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseEncoder;

impl ResponseEncoder for DefaultResponseEncoder {
    fn encode(&self, head: &RequestHead, reply: &Value, codecs: &Codecs) -> Result<HttpResponse, StatusError> {
        let codec = codecs
            .response_codec(&head.headers)
            .map_err(|e| StatusError::invalid_argument("CodecUnsupported", e.to_string()))?;
        let body = codec
            .encode_value(reply)
            .map_err(|e| StatusError::internal("CodecMarshal", e.to_string()))?;

        let mut response = Response::new(Full::new(Bytes::from(body)));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(codec.content_type()));
        Ok(response)
    }
}

/// Writes the normalized error with its mapped HTTP status.
///
/// When no codec can be negotiated or the error cannot be encoded, the
/// response is a bare 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorEncoder;

impl ErrorEncoder for DefaultErrorEncoder {
    fn encode(&self, head: &RequestHead, err: &(dyn Error + Send + Sync + 'static), codecs: &Codecs) -> HttpResponse {
        let status = janus_middleware::convert(err);

        let Ok(codec) = codecs.response_codec(&head.headers) else {
            return bare(StatusCode::INTERNAL_SERVER_ERROR);
        };
        let (code, body) = match janus_middleware::encode_http(&status, codec.as_ref()) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode error response");
                return bare(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = code;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(codec.content_type()));
        response
    }
}

fn bare(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
