//! # Janus
//!
//! **One service implementation, served over HTTP and gRPC.**
//!
//! Janus puts a single ordered middleware pipeline and a single structured
//! error model in front of both transports:
//!
//! - **Middleware** composes globally, per service and per call, identically
//!   for HTTP and gRPC ([`middleware::Chain`])
//! - **Errors** are `(code, reason, message)` triples that survive the wire
//!   in both directions: an HTTP status plus encoded body, or a gRPC status
//!   with an `ErrorInfo` detail ([`core::StatusError`])
//! - **Panics** are contained by recovery and reported as `Unknown`
//! - **Transport context** tells middleware which protocol serves the call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use janus::prelude::*;
//!
//! let pipeline = Chain::new()
//!     .with(Recovery::new())
//!     .with(StatusServer::new())
//!     .with(Logging::server());
//!
//! let http = HttpServer::builder()
//!     .middleware(pipeline.clone())
//!     .route(Method::GET, "/helloworld/{name}", ServiceKey::of::<Greeter>(), say_hello)
//!     .build()?;
//!
//! let interceptor = UnaryInterceptor::new(pipeline, ServiceRegistry::default());
//! let grpc = GrpcServer::builder()
//!     .add_service(GreeterServer::new(Greeter { interceptor }))
//!     .build();
//!
//! App::new().server(http).server(grpc).run().await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! HTTP request ─┐                                              ┌─ HTTP response / status + body
//!               ├─ transport ─ [global] ─ [service] ─ handler ─┤
//! gRPC call ────┘  context                                     └─ gRPC status + ErrorInfo
//! ```

#![doc(html_root_url = "https://docs.rs/janus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Core types: context, transport, handlers, codecs, errors
pub use janus_core as core;

// Middleware chain and built-in stages
pub use janus_middleware as middleware;

// HTTP and gRPC servers
pub use janus_server as server;

// HTTP and gRPC clients
pub use janus_client as client;

// Configuration loading
pub use janus_config as config;

// Logging setup
pub use janus_telemetry as telemetry;

// Service registration and discovery
pub use janus_registry as registry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use janus::prelude::*;
///
/// let chain = Chain::new().with(Recovery::new()).with(StatusServer::new());
/// assert_eq!(chain.len(), 2);
/// ```
pub mod prelude {
    pub use janus_core::{
        from_transport, typed, BoxError, Code, Codecs, Context, Handler, Kind, Payload, ServiceKey, StatusError,
        Transport,
    };

    pub use janus_middleware::{Chain, FnMiddleware, Logging, Middleware, Next, Recovery, StatusClient, StatusServer};

    pub use janus_server::{App, GrpcServer, HttpServer, ServiceRegistry, ShutdownSignal, UnaryInterceptor};

    pub use janus_client::{ClientError, GrpcClient, HttpClient};

    pub use janus_config::{ConfigLoader, JanusConfig};

    pub use janus_telemetry::{init_logging, LogConfig};

    pub use janus_registry::{Discovery, MemoryRegistry, Registrar, ServiceInstance};

    pub use http::Method;
}
