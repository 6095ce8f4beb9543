//! HTTP client.
//!
//! Calls run through `[recovery] -> [user middleware] -> round trip`. The
//! round trip encodes the request with the default codec, sends it with
//! reqwest and hands every response to the [`ErrorDecoder`] before the
//! reply body is decoded. With the [`DefaultErrorDecoder`], a non-2xx
//! response surfaces as [`ClientError::Status`] carrying the exact
//! `code`, `reason` and `message` the server produced.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, Version};
use janus_core::{
    typed, BoxError, Codecs, Context, Handler, HttpTransport, Payload, RequestHead, StatusError, Transport,
};
use janus_middleware::{decode_http, Chain, Recovery};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Default connection timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default TCP keep-alive.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Inspects a response before its body is decoded as a reply.
pub trait ErrorDecoder: Send + Sync + 'static {
    /// Returns an error if the response represents a failed call.
    fn decode(&self, status: StatusCode, headers: &HeaderMap, body: &[u8], codecs: &Codecs) -> ClientResult<()>;
}

/// Decodes non-2xx responses into structured errors.
///
/// The body codec is chosen from the response `Content-Type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorDecoder;

impl ErrorDecoder for DefaultErrorDecoder {
    fn decode(&self, status: StatusCode, headers: &HeaderMap, body: &[u8], codecs: &Codecs) -> ClientResult<()> {
        if status.is_success() {
            return Ok(());
        }
        let decode_error = |source| ClientError::Decode {
            status: status.as_u16(),
            source,
        };
        let codec = codecs.request_codec(headers).map_err(decode_error)?;
        match decode_http(status, codec.as_ref(), body).map_err(decode_error)? {
            Some(err) => Err(ClientError::Status(err)),
            None => Ok(()),
        }
    }
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
    middleware: Chain,
    codecs: Codecs,
    error_decoder: Box<dyn ErrorDecoder>,
}

/// An HTTP client bound to one endpoint.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    /// Creates a builder with default timeouts.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Returns the base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Sends a `GET` request.
    pub async fn get<Res>(&self, path: &str) -> ClientResult<Res>
    where
        Res: DeserializeOwned,
    {
        self.invoke::<(), Res>(Context::new(), Method::GET, path, None).await
    }

    /// Sends a `POST` request with `body`.
    pub async fn post<Req, Res>(&self, path: &str, body: &Req) -> ClientResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.invoke(Context::new(), Method::POST, path, Some(body)).await
    }

    /// Sends a request and decodes the reply.
    ///
    /// `path` is appended to the endpoint. The call is bounded by the
    /// request timeout, surfacing as `DeadlineExceeded`.
    pub async fn invoke<Req, Res>(
        &self,
        ctx: Context,
        method: Method,
        path: &str,
        body: Option<&Req>,
    ) -> ClientResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = format!("{}{}", self.inner.endpoint, path);
        let uri: Uri = url.parse().map_err(|e| ClientError::invalid_endpoint(&url, e))?;
        let body = match body {
            Some(body) => serde_json::to_value(body).map_err(|e| ClientError::Codec(e.into()))?,
            None => Value::Null,
        };

        let codec = self.inner.codecs.default_codec();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(codec.content_type()));
        if !body.is_null() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(codec.content_type()));
        }
        let head = RequestHead {
            method,
            uri,
            version: Version::HTTP_11,
            headers,
        };

        let ctx = ctx
            .with_transport(Transport::Http(HttpTransport::new(head.clone())))
            .with_timeout(self.inner.request_timeout);

        let inner = Arc::clone(&self.inner);
        let terminal = typed(move |_ctx: Context, body: Value| {
            let inner = Arc::clone(&inner);
            let head = head.clone();
            let url = url.clone();
            async move { round_trip(&inner, head, url, body).await.map_err(BoxError::from) }
        });
        let handler = self.inner.middleware.then(terminal);

        let reply = ctx
            .run_until_done(handler.call(ctx.clone(), Payload::new(body)))
            .await?
            .map_err(into_client_error)?
            .into_typed::<Value>()?;
        serde_json::from_value(reply).map_err(|e| ClientError::Codec(e.into()))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.inner.endpoint)
            .field("request_timeout", &self.inner.request_timeout)
            .field("middleware", &self.inner.middleware)
            .finish_non_exhaustive()
    }
}

async fn round_trip(inner: &Inner, head: RequestHead, url: String, body: Value) -> ClientResult<Value> {
    let mut request = inner.client.request(head.method, url).headers(head.headers);
    if !body.is_null() {
        let encoded = inner.codecs.default_codec().encode_value(&body)?;
        request = request.body(encoded);
    }

    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.bytes().await.map_err(transport_error)?;
    tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "http response received");

    inner.error_decoder.decode(status, &headers, &bytes, &inner.codecs)?;

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let codec = inner.codecs.request_codec(&headers)?;
    Ok(codec.decode_value(&bytes)?)
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Status(StatusError::deadline_exceeded("DeadlineExceeded", err.to_string()))
    } else {
        ClientError::Transport(err)
    }
}

fn into_client_error(err: BoxError) -> ClientError {
    match err.downcast::<ClientError>() {
        Ok(err) => *err,
        Err(other) => ClientError::Status(StatusError::from_boxed(other)),
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    endpoint: Option<String>,
    dial_timeout: Duration,
    request_timeout: Duration,
    keep_alive: Duration,
    user_agent: Option<String>,
    middleware: Chain,
    codecs: Codecs,
    error_decoder: Box<dyn ErrorDecoder>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            user_agent: None,
            middleware: Chain::new(),
            codecs: Codecs::default(),
            error_decoder: Box::new(DefaultErrorDecoder),
        }
    }
}

impl HttpClientBuilder {
    /// Applies a loaded `client.http` section.
    pub fn from_config(mut self, config: &janus_config::HttpClientConfig) -> Self {
        if let Some(endpoint) = &config.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        self.dial_timeout = Duration::from_millis(config.dial_timeout_ms);
        self.request_timeout = Duration::from_millis(config.request_timeout_ms);
        self.keep_alive = Duration::from_millis(config.keep_alive_ms);
        if !config.user_agent.is_empty() {
            self.user_agent = Some(config.user_agent.clone());
        }
        self
    }

    /// Sets the base URL, e.g. `http://127.0.0.1:8000`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the connection timeout.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Sets the whole-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the TCP keep-alive interval.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the `User-Agent` sent when a request carries none.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the client middleware, run inside recovery.
    pub fn middleware(mut self, chain: Chain) -> Self {
        self.middleware = chain;
        self
    }

    /// Replaces the codec registry.
    pub fn codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    /// Replaces the error decoder.
    pub fn error_decoder(mut self, decoder: impl ErrorDecoder) -> Self {
        self.error_decoder = Box::new(decoder);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ClientResult<HttpClient> {
        let endpoint = self.endpoint.ok_or(ClientError::MissingEndpoint)?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ClientError::invalid_endpoint(endpoint, "expected an http:// or https:// URL"));
        }

        let mut client = reqwest::Client::builder()
            .connect_timeout(self.dial_timeout)
            .timeout(self.request_timeout)
            .tcp_keepalive(self.keep_alive);
        if let Some(user_agent) = &self.user_agent {
            client = client.user_agent(user_agent.as_str());
        }

        Ok(HttpClient {
            inner: Arc::new(Inner {
                client: client.build()?,
                endpoint,
                request_timeout: self.request_timeout,
                middleware: Chain::new().with(Recovery::new()).extend(&self.middleware),
                codecs: self.codecs,
                error_decoder: self.error_decoder,
            }),
        })
    }
}
