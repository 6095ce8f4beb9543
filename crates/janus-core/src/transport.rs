//! Transport context.
//!
//! A [`Transport`] tells middleware which protocol is serving the current
//! call and exposes the protocol-specific request metadata. Middleware that
//! behaves differently per protocol (status translation, access logging)
//! dispatches on [`Transport::kind`].

use crate::context::Context;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use parking_lot::Mutex;
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Protocol kind of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// HTTP/1.1 JSON-style transport.
    Http,
    /// gRPC over HTTP/2.
    Grpc,
}

impl Kind {
    /// Returns the upper-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Grpc => "GRPC",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a registered service implementation.
///
/// Two keys are equal exactly when they were built from the same
/// implementation type. The type name is kept for logs only.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Returns the key for implementation type `S`.
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }

    /// Returns the key for the type of `service`.
    #[must_use]
    pub fn of_val<S: ?Sized + 'static>(_service: &S) -> Self {
        Self::of::<S>()
    }

    /// Returns the fully qualified name of the implementation type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceKey").field(&self.name).finish()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The inbound HTTP request line and headers.
#[derive(Debug, Clone, Default)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Captures the head of a request.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }
}

/// Response headers that handlers and middleware may set before the body
/// is written.
///
/// Clones share the same header map.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    headers: Arc<Mutex<HeaderMap>>,
}

impl ResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing existing values.
    pub fn insert(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().insert(name, value);
    }

    /// Appends a header value.
    pub fn append(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().append(name, value);
    }

    /// Returns a copy of the headers set so far.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.headers.lock().clone()
    }

    /// Takes the headers out, leaving the writer empty.
    #[must_use]
    pub fn take(&self) -> HeaderMap {
        std::mem::take(&mut *self.headers.lock())
    }
}

/// HTTP transport details.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    request: RequestHead,
    route: Option<String>,
    response: ResponseWriter,
}

impl HttpTransport {
    /// Creates HTTP transport details for a request.
    #[must_use]
    pub fn new(request: RequestHead) -> Self {
        Self {
            request,
            route: None,
            response: ResponseWriter::new(),
        }
    }

    /// Records the route template that matched the request.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Returns the inbound request head.
    #[must_use]
    pub const fn request(&self) -> &RequestHead {
        &self.request
    }

    /// Returns the matched route template, e.g. `/helloworld/{name}`.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Returns the response header writer.
    #[must_use]
    pub const fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.request.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.path()
    }
}

/// gRPC transport details.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    full_method: String,
    service: ServiceKey,
    metadata: HeaderMap,
}

impl GrpcTransport {
    /// Creates gRPC transport details for a call to `full_method`
    /// (`/package.Service/Method`) served by `service`.
    #[must_use]
    pub fn new(full_method: impl Into<String>, service: ServiceKey) -> Self {
        Self {
            full_method: full_method.into(),
            service,
            metadata: HeaderMap::new(),
        }
    }

    /// Attaches request metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HeaderMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the full method name.
    #[must_use]
    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    /// Returns the identity of the implementation serving the call.
    #[must_use]
    pub const fn service(&self) -> ServiceKey {
        self.service
    }

    /// Returns the request metadata.
    #[must_use]
    pub const fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Returns the service part of the full method, without the leading slash.
    ///
    /// `/helloworld.Greeter/SayHello` yields `helloworld.Greeter`.
    #[must_use]
    pub fn service_name(&self) -> &str {
        split_full_method(&self.full_method).0
    }

    /// Returns the method part of the full method.
    ///
    /// `/helloworld.Greeter/SayHello` yields `SayHello`.
    #[must_use]
    pub fn method_name(&self) -> &str {
        split_full_method(&self.full_method).1
    }
}

fn split_full_method(full_method: &str) -> (&str, &str) {
    let trimmed = full_method.strip_prefix('/').unwrap_or(full_method);
    trimmed.rsplit_once('/').unwrap_or(("", trimmed))
}

/// The protocol serving a call.
#[derive(Debug, Clone)]
pub enum Transport {
    /// HTTP transport.
    Http(HttpTransport),
    /// gRPC transport.
    Grpc(GrpcTransport),
}

impl Transport {
    /// Returns the protocol kind.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Http(_) => Kind::Http,
            Self::Grpc(_) => Kind::Grpc,
        }
    }

    /// Returns the HTTP details when serving over HTTP.
    #[must_use]
    pub const fn as_http(&self) -> Option<&HttpTransport> {
        match self {
            Self::Http(http) => Some(http),
            Self::Grpc(_) => None,
        }
    }

    /// Returns the gRPC details when serving over gRPC.
    #[must_use]
    pub const fn as_grpc(&self) -> Option<&GrpcTransport> {
        match self {
            Self::Grpc(grpc) => Some(grpc),
            Self::Http(_) => None,
        }
    }
}

/// Returns a context carrying `transport`.
///
/// Equivalent to [`Context::with_transport`]: the first attached transport
/// is kept.
#[must_use]
pub fn with_transport(ctx: Context, transport: Transport) -> Context {
    ctx.with_transport(transport)
}

/// Returns the transport carried by `ctx`, if any.
#[must_use]
pub fn from_transport(ctx: &Context) -> Option<&Transport> {
    ctx.transport()
}
