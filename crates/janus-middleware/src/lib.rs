//! # Janus Middleware
//!
//! Transport-agnostic middleware for Janus.
//!
//! A [`Middleware`] turns a handler into another handler. A [`Chain`]
//! composes middleware in a fixed order: the first middleware added is the
//! outermost, so it sees the call first and the result last.
//!
//! ```text
//! call → Recovery → Logging → StatusServer → handler
//!                                               ↓
//! result ← Recovery ← Logging ← StatusServer ←──┘
//! ```
//!
//! ## Stages
//!
//! | Stage | Middleware | Purpose |
//! |---|---|---|
//! | recovery | [`Recovery`] | Catch panics, return a `StatusError` |
//! | status_server | [`StatusServer`] | Encode errors for the serving transport |
//! | status_client | [`StatusClient`] | Decode native failures into `StatusError` |
//! | logging | [`Logging`] | Structured access record per call |
//!
//! ## Example
//!
//! ```
//! use janus_core::{typed, BoxError, Context, Handler, Payload};
//! use janus_middleware::{Chain, Logging, Recovery, StatusServer};
//!
//! # tokio_test::block_on(async {
//! let chain = Chain::new()
//!     .with(Recovery::new())
//!     .with(Logging::server())
//!     .with(StatusServer::new());
//!
//! let handler = chain.then(typed(|_ctx: Context, name: String| async move {
//!     Ok::<_, BoxError>(format!("Hello {name}"))
//! }));
//! let reply = handler.call(Context::new(), Payload::new("janus".to_string())).await.unwrap();
//! assert_eq!(reply.downcast::<String>().unwrap(), "Hello janus");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/janus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod stages;

pub use chain::Chain;
pub use middleware::{wrap, BoxedMiddleware, FnMiddleware, Middleware, Next};
pub use stages::status::{
    convert, decode_http, encode_http, from_grpc_status, to_grpc_status, CODE_METADATA_KEY, MESSAGE_METADATA_KEY,
};
pub use stages::{Fault, Logging, Recovery, Side, StatusClient, StatusServer};
