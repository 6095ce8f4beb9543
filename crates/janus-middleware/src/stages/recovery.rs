//! Panic recovery middleware.
//!
//! Runs the inner handler behind an unwind boundary. A panic anywhere inside
//! the call is caught, logged with a diagnostic snapshot and converted into a
//! [`StatusError`]; the caller always gets an ordinary `Err`.
//!
//! By default the error is `Unknown` with reason `"Unknown"` and message
//! `"panic triggered: {panic value}"`. A custom [`RecoveryHandler`] can
//! classify faults differently.

use crate::middleware::{Middleware, Next};
use futures_util::FutureExt;
use janus_core::{BoxFuture, Context, HandlerResult, Payload, StatusError, UNKNOWN_REASON};
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Diagnostic snapshot of a caught panic.
///
/// Holds the raw panic value, so a handler can recognise its own fault
/// types raised with [`std::panic::panic_any`].
#[derive(Debug)]
pub struct Fault {
    message: String,
    payload: Box<dyn Any + Send>,
    backtrace: Backtrace,
}

impl Fault {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
            payload,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns the raw panic value.
    #[must_use]
    pub fn payload(&self) -> &(dyn Any + Send) {
        self.payload.as_ref()
    }

    /// Returns the panic value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns the panic value rendered as text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the backtrace captured when the panic was caught.
    ///
    /// Only populated when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` is set.
    #[must_use]
    pub const fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Classifies a caught panic.
///
/// Receives the call context, the type name of the request payload and the
/// fault, whose raw panic value is reachable through [`Fault::downcast_ref`].
pub type RecoveryHandler = Arc<dyn Fn(&Context, &str, &Fault) -> StatusError + Send + Sync>;

/// Panic recovery middleware.
#[derive(Clone)]
pub struct Recovery {
    handler: Option<RecoveryHandler>,
}

impl Recovery {
    /// Creates recovery with the default classification.
    #[must_use]
    pub fn new() -> Self {
        Self { handler: None }
    }

    /// Sets a custom classification for caught panics.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Context, &str, &Fault) -> StatusError + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    fn classify(&self, ctx: &Context, request_type: &str, fault: &Fault) -> StatusError {
        match &self.handler {
            Some(handler) => handler(ctx, request_type, fault),
            None => StatusError::unknown(
                UNKNOWN_REASON,
                format!("panic triggered: {}", fault.message),
            ),
        }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recovery")
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

impl Middleware for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let request_type = request.type_name();
            let call = next.run(ctx.clone(), request);
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let fault = Fault::from_panic(payload);
                    tracing::error!(
                        request_id = %ctx.request_id(),
                        request_type,
                        panic = %fault.message,
                        backtrace = %fault.backtrace,
                        "handler panicked"
                    );
                    Err(self.classify(&ctx, request_type, &fault).into())
                }
            }
        })
    }
}
