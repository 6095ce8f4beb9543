//! # Janus Client
//!
//! HTTP and gRPC clients that share the server's error model.
//!
//! - [`HttpClient`]: reqwest with dial/request timeouts, keep-alive, a user
//!   agent and an [`ErrorDecoder`] turning failed responses into
//!   [`StatusError`](janus_core::StatusError)s
//! - [`GrpcClient`]: a tonic channel whose calls decode `tonic::Status`
//!   details back into `StatusError`s
//!
//! Both run client middleware behind panic recovery and bound every call
//! with their timeout.
//!
//! ## Example
//!
//! ```rust,no_run
//! use janus_client::HttpClient;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct HelloReply {
//!     message: String,
//! }
//!
//! # async fn run() -> Result<(), janus_client::ClientError> {
//! let client = HttpClient::builder().endpoint("http://127.0.0.1:8000").build()?;
//!
//! match client.get::<HelloReply>("/helloworld/janus").await {
//!     Ok(reply) => println!("{}", reply.message),
//!     Err(err) => {
//!         let status = err.into_status();
//!         eprintln!("{} {} {}", status.code, status.reason, status.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod grpc;
mod http;

pub use self::http::{
    DefaultErrorDecoder, ErrorDecoder, HttpClient, HttpClientBuilder, DEFAULT_DIAL_TIMEOUT, DEFAULT_KEEP_ALIVE,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{ClientError, ClientResult};
pub use grpc::{GrpcClient, GrpcClientBuilder, DEFAULT_GRPC_TIMEOUT};
