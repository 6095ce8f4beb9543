//! # Janus Core
//!
//! Core types shared by every Janus transport binding.
//!
//! This crate provides the foundational, transport-agnostic pieces:
//!
//! - [`StatusError`] / [`Code`] - The structured `(code, reason, message)` error model
//! - [`Context`] - Per-call execution context (request ID, deadline, cancellation, values)
//! - [`Transport`] - Which protocol is serving the call, plus protocol-specific metadata
//! - [`Handler`] / [`Payload`] - Opaque-payload handler abstraction used by middleware
//! - [`codec`] - Content codecs selected by negotiated content type

#![doc(html_root_url = "https://docs.rs/janus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod codec;
mod context;
mod error;
mod handler;
mod transport;

pub use codec::{Codec, CodecError, Codecs, JsonCodec, YamlCodec};
pub use context::{Context, RequestId};
pub use error::{http_status_for, BoxError, Code, JanusResult, StatusError, UNKNOWN_REASON};
pub use handler::{typed, BoxFuture, BoxHandler, Handler, HandlerResult, Payload};
pub use transport::{
    from_transport, with_transport, GrpcTransport, HttpTransport, Kind, RequestHead,
    ResponseWriter, ServiceKey, Transport,
};
