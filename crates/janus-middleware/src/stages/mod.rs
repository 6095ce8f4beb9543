//! Built-in middleware stages.
//!
//! - [`recovery`] - Contain panics and classify them as errors
//! - [`status`] - Translate errors to and from native transport failures
//! - [`logging`] - One structured access record per call
//!
//! A typical server chain is `[Recovery, Logging, StatusServer]`; a typical
//! client chain is `[Recovery, StatusClient, Logging]`.

pub mod logging;
pub mod recovery;
pub mod status;

pub use logging::{Logging, Side};
pub use recovery::{Fault, Recovery, RecoveryHandler};
pub use status::{StatusClient, StatusHandler, StatusServer};
