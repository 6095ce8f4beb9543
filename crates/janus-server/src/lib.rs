//! # Janus Server
//!
//! HTTP and gRPC server bindings sharing one middleware model.
//!
//! - HTTP/1.1 via hyper, typed routes with `{param}` templates
//! - gRPC via tonic, with [`UnaryInterceptor`] wrapping each unary method
//! - A global middleware chain plus per-service chains ([`ServiceRegistry`])
//! - Pluggable request decoding and response/error encoding
//! - Graceful shutdown and multi-server [`App`]s
//!
//! ## Example
//!
//! ```rust,no_run
//! use http::Method;
//! use janus_core::{BoxError, Context, ServiceKey};
//! use janus_middleware::{Chain, Logging, Recovery, StatusServer};
//! use janus_server::{App, HttpServer};
//! use serde::{Deserialize, Serialize};
//!
//! struct Greeter;
//!
//! #[derive(Deserialize)]
//! struct HelloRequest {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct HelloReply {
//!     message: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let http = HttpServer::builder()
//!     .address("0.0.0.0:8000")
//!     .middleware(
//!         Chain::new()
//!             .with(Recovery::new())
//!             .with(StatusServer::new())
//!             .with(Logging::server()),
//!     )
//!     .route(
//!         Method::GET,
//!         "/helloworld/{name}",
//!         ServiceKey::of::<Greeter>(),
//!         |_ctx: Context, req: HelloRequest| async move {
//!             Ok::<_, BoxError>(HelloReply { message: format!("Hello {}", req.name) })
//!         },
//!     )
//!     .build()?;
//!
//! App::new().server(http).run().await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod encoding;
mod error;
mod grpc;
mod http;
mod lifecycle;
mod registry;
mod shutdown;

pub use config::{
    ListenConfig, DEFAULT_GRPC_ADDR, DEFAULT_HTTP_ADDR, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use encoding::{
    DefaultErrorEncoder, DefaultRequestDecoder, DefaultResponseEncoder, ErrorEncoder, HttpResponse,
    InboundRequest, RequestDecoder, ResponseBody, ResponseEncoder,
};
pub use error::{ServerError, ServerResult};
pub use grpc::{GrpcServer, GrpcServerBuilder, UnaryInterceptor};
pub use self::http::{HttpServer, HttpServerBuilder};
pub use lifecycle::{App, Server};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
