//! HTTP server binding.
//!
//! Built on hyper (HTTP/1.1) and tokio. Every call:
//!
//! 1. matches `(method, path)` against the route table
//! 2. installs an HTTP [`Transport`] and a deadline in the [`Context`]
//! 3. decodes the request with the [`RequestDecoder`]
//! 4. runs `[global chain] -> [service chain] -> handler`
//! 5. writes the reply with the [`ResponseEncoder`], or the failure with
//!    the [`ErrorEncoder`]
//!
//! Unknown routes, including a known path with another method, produce
//! `NotFound("NotFound")` through the error encoder.
//!
//! # Example
//!
//! ```no_run
//! use http::Method;
//! use janus_core::{BoxError, Context, ServiceKey};
//! use janus_middleware::{Chain, Logging, Recovery, StatusServer};
//! use janus_server::{HttpServer, ShutdownSignal};
//! use serde::{Deserialize, Serialize};
//!
//! struct Greeter;
//!
//! #[derive(Deserialize)]
//! struct HelloRequest { name: String }
//!
//! #[derive(Serialize)]
//! struct HelloReply { message: String }
//!
//! # async fn run() -> Result<(), janus_server::ServerError> {
//! let server = HttpServer::builder()
//!     .address("127.0.0.1:8000")
//!     .middleware(Chain::new().with(Recovery::new()).with(StatusServer::new()).with(Logging::server()))
//!     .route(Method::GET, "/helloworld/{name}", ServiceKey::of::<Greeter>(), |_ctx: Context, req: HelloRequest| async move {
//!         Ok::<_, BoxError>(HelloReply { message: format!("Hello {}", req.name) })
//!     })
//!     .build()?;
//!
//! server.run_with_shutdown(ShutdownSignal::new()).await
//! # }
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use janus_core::{
    typed, BoxError, BoxHandler, Codecs, Context, HttpTransport, Payload, RequestHead, ServiceKey,
    StatusError, Transport,
};
use janus_middleware::Chain;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenConfig;
use crate::encoding::{
    DefaultErrorEncoder, DefaultRequestDecoder, DefaultResponseEncoder, ErrorEncoder, HttpResponse,
    InboundRequest, RequestDecoder, ResponseEncoder,
};
use crate::error::{ServerError, ServerResult};
use crate::registry::ServiceRegistry;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

type DecodeFn = Arc<dyn Fn(Value) -> Result<Payload, StatusError> + Send + Sync>;
type EncodeFn = Arc<dyn Fn(Payload) -> Result<Value, StatusError> + Send + Sync>;

/// Decodes a merged request value into `Req`.
///
/// Path and query parameters arrive as strings. When strict decoding fails
/// and every field is a string, the fields are decoded again as a form, so
/// parameters can fill numeric and boolean fields.
fn decode_request<Req: DeserializeOwned>(value: &Value) -> Result<Req, StatusError> {
    let strict = match Req::deserialize(value) {
        Ok(req) => return Ok(req),
        Err(err) => err,
    };
    let unmarshal = || StatusError::invalid_argument("CodecUnmarshal", strict.to_string());

    let Value::Object(fields) = value else {
        return Err(unmarshal());
    };
    let pairs = fields
        .iter()
        .map(|(key, value)| value.as_str().map(|value| (key.as_str(), value)))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(unmarshal)?;
    let form = serde_urlencoded::to_string(pairs).map_err(|_| unmarshal())?;
    serde_urlencoded::from_str::<Req>(&form).map_err(|_| unmarshal())
}

struct Route {
    pattern: String,
    decode: DecodeFn,
    encode: EncodeFn,
    handler: BoxHandler,
}

struct PendingRoute {
    method: Method,
    pattern: String,
    service: ServiceKey,
    decode: DecodeFn,
    encode: EncodeFn,
    terminal: BoxHandler,
}

/// The HTTP server.
pub struct HttpServer {
    config: ListenConfig,
    routes: matchit::Router<HashMap<Method, Arc<Route>>>,
    codecs: Codecs,
    decoder: Arc<dyn RequestDecoder>,
    encoder: Arc<dyn ResponseEncoder>,
    error_encoder: Arc<dyn ErrorEncoder>,
}

impl HttpServer {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> HttpServerBuilder {
        HttpServerBuilder::default()
    }

    /// Returns the listener configuration.
    #[must_use]
    pub fn config(&self) -> &ListenConfig {
        &self.config
    }

    /// Handles one request with a collected body.
    ///
    /// This is the whole HTTP pipeline without a socket.
    pub async fn serve(&self, request: Request<Bytes>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let head = RequestHead::from_parts(&parts);

        let Some((route, params)) = self.lookup(&head) else {
            let err = StatusError::not_found(
                "NotFound",
                format!("no route for {} {}", head.method, head.path()),
            );
            return self.error_encoder.encode(&head, &err, &self.codecs);
        };

        let transport = HttpTransport::new(head.clone()).with_route(route.pattern.clone());
        let writer = transport.response().clone();
        let ctx = Context::new()
            .with_transport(Transport::Http(transport))
            .with_timeout(self.config.timeout());

        let mut response = match self.dispatch(&ctx, &route, &head, &params, &body).await {
            Ok(response) => response,
            Err(err) => self.error_encoder.encode(&head, err.as_ref(), &self.codecs),
        };
        response.headers_mut().extend(writer.take());
        response
    }

    fn lookup(&self, head: &RequestHead) -> Option<(Arc<Route>, Vec<(String, String)>)> {
        let matched = self.routes.at(head.path()).ok()?;
        let route = matched.value.get(&head.method)?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some((Arc::clone(route), params))
    }

    async fn dispatch(
        &self,
        ctx: &Context,
        route: &Route,
        head: &RequestHead,
        params: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, BoxError> {
        let value = self
            .decoder
            .decode(InboundRequest { head, params, body }, &self.codecs)
            .map_err(|e| {
                tracing::debug!(error = %e, route = %route.pattern, "request decode failed");
                e
            })?;
        let request = (route.decode)(value)?;

        let reply = ctx
            .run_until_done(route.handler.call(ctx.clone(), request))
            .await??;

        let value = (route.encode)(reply)?;
        Ok(self.encoder.encode(head, &value, &self.codecs)?)
    }

    async fn handle(&self, request: Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();

        match tokio::time::timeout(self.config.timeout(), body.collect()).await {
            Ok(Ok(collected)) => {
                self.serve(Request::from_parts(parts, collected.to_bytes()))
                    .await
            }
            Ok(Err(e)) => {
                let head = RequestHead::from_parts(&parts);
                let err = StatusError::data_loss("DataLoss", e.to_string());
                self.error_encoder.encode(&head, &err, &self.codecs)
            }
            Err(_) => {
                let head = RequestHead::from_parts(&parts);
                let err = StatusError::deadline_exceeded("DeadlineExceeded", "request body read timed out");
                self.error_encoder.encode(&head, &err, &self.codecs)
            }
        }
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires, then
    /// waits up to the shutdown timeout for open connections to finish.
    pub async fn run_with_listener(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "HTTP server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(server, stream, remote_addr, shutdown).await {
                                tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping HTTP server");
                    break;
                }
            }
        }
        drop(listener);

        let shutdown_timeout = server.config.shutdown_timeout();
        tokio::select! {
            () = tracker.wait_for_drain() => tracing::info!("all HTTP connections closed"),
            () = tokio::time::sleep(shutdown_timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with open connections"
            ),
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.config)
            .field("codecs", &self.codecs)
            .finish_non_exhaustive()
    }
}

async fn handle_connection(
    server: Arc<HttpServer>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: Request<Incoming>| {
        let server = Arc::clone(&server);
        async move { Ok::<_, Infallible>(server.handle(request).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            tracing::debug!(remote = %remote_addr, "draining connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

/// Builder for [`HttpServer`].
pub struct HttpServerBuilder {
    config: ListenConfig,
    middleware: Chain,
    registry: ServiceRegistry,
    codecs: Codecs,
    decoder: Arc<dyn RequestDecoder>,
    encoder: Arc<dyn ResponseEncoder>,
    error_encoder: Arc<dyn ErrorEncoder>,
    routes: Vec<PendingRoute>,
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self {
            config: ListenConfig::http(),
            middleware: Chain::new(),
            registry: ServiceRegistry::default(),
            codecs: Codecs::default(),
            decoder: Arc::new(DefaultRequestDecoder),
            encoder: Arc::new(DefaultResponseEncoder),
            error_encoder: Arc::new(DefaultErrorEncoder),
            routes: Vec::new(),
        }
    }
}

impl HttpServerBuilder {
    /// Replaces the listener configuration.
    pub fn config(mut self, config: ListenConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies a loaded `server.http` section.
    pub fn from_config(self, config: &janus_config::HttpServerConfig) -> Self {
        let shutdown_timeout = self.config.shutdown_timeout();
        self.config(ListenConfig::from(config).with_shutdown_timeout(shutdown_timeout))
    }

    /// Sets the bind address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config = self.config.with_address(address);
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_shutdown_timeout(timeout);
        self
    }

    /// Sets the global chain, applied to every route.
    pub fn middleware(mut self, chain: Chain) -> Self {
        self.middleware = chain;
        self
    }

    /// Sets the per-service chains.
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the codec registry.
    pub fn codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    /// Replaces the request decoder.
    pub fn request_decoder(mut self, decoder: impl RequestDecoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Replaces the response encoder.
    pub fn response_encoder(mut self, encoder: impl ResponseEncoder) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Replaces the error encoder.
    pub fn error_encoder(mut self, encoder: impl ErrorEncoder) -> Self {
        self.error_encoder = Arc::new(encoder);
        self
    }

    /// Registers a typed route.
    ///
    /// `path` uses `{name}` segments for parameters and `{*rest}` for a
    /// catch-all. The request is decoded into `Req`; the reply is encoded
    /// from `Res`. `service` selects the per-service chain.
    ///
    /// Parameters fill string, numeric and boolean fields of `Req`. Mixed
    /// with a body, they only fill string fields.
    pub fn route<Req, Res, F, Fut>(mut self, method: Method, path: &str, service: ServiceKey, handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
    {
        let decode: DecodeFn = Arc::new(|value| decode_request::<Req>(&value).map(Payload::new));
        let encode: EncodeFn = Arc::new(|payload| {
            let reply = payload.into_typed::<Res>()?;
            serde_json::to_value(&reply).map_err(|e| StatusError::internal("CodecMarshal", e.to_string()))
        });

        self.routes.push(PendingRoute {
            method,
            pattern: path.to_string(),
            service,
            decode,
            encode,
            terminal: typed(handler),
        });
        self
    }

    /// Composes every route with its chains and builds the route table.
    pub fn build(self) -> ServerResult<HttpServer> {
        let mut grouped: Vec<(String, HashMap<Method, Arc<Route>>)> = Vec::new();

        for pending in self.routes {
            let index = match grouped.iter().position(|(p, _)| *p == pending.pattern) {
                Some(index) => index,
                None => {
                    grouped.push((pending.pattern.clone(), HashMap::new()));
                    grouped.len() - 1
                }
            };
            let methods = &mut grouped[index].1;
            if methods.contains_key(&pending.method) {
                return Err(ServerError::route(&pending.method, pending.pattern, "duplicate route"));
            }

            let handler = self
                .middleware
                .then(self.registry.apply(&pending.service, pending.terminal));
            methods.insert(
                pending.method,
                Arc::new(Route {
                    pattern: pending.pattern,
                    decode: pending.decode,
                    encode: pending.encode,
                    handler,
                }),
            );
        }

        let mut routes = matchit::Router::new();
        for (pattern, methods) in grouped {
            let method_list = methods.keys().map(Method::as_str).collect::<Vec<_>>().join(",");
            routes
                .insert(pattern.clone(), methods)
                .map_err(|e| ServerError::route(method_list, pattern, e))?;
        }

        Ok(HttpServer {
            config: self.config,
            routes,
            codecs: self.codecs,
            decoder: self.decoder,
            encoder: self.encoder,
            error_encoder: self.error_encoder,
        })
    }
}
