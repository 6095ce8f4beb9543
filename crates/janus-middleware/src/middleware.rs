//! Core middleware trait and types.
//!
//! A [`Middleware`] receives the call context, the opaque request payload and
//! a [`Next`] callback that runs the rest of the chain. It can act before
//! and after the inner handler, short-circuit by not calling `next`, or
//! rewrite the result.
//!
//! # Example
//!
//! ```
//! use janus_core::{BoxFuture, Context, HandlerResult, Payload};
//! use janus_middleware::{Middleware, Next};
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: Context,
//!         request: Payload,
//!         next: Next,
//!     ) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             tracing::debug!(request_id = %ctx.request_id(), "audit");
//!             next.run(ctx, request).await
//!         })
//!     }
//! }
//! ```

use janus_core::{BoxFuture, BoxHandler, Context, Handler, HandlerResult, Payload};
use std::future::Future;
use std::sync::Arc;

/// The core middleware trait.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once
/// - Middleware never drops an error; it may reclassify it
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Processes one call.
    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// A shared middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Callback that runs the remainder of the chain.
///
/// Consumed on use, so it can only be called once.
pub struct Next {
    handler: BoxHandler,
}

impl Next {
    /// Creates a `Next` that invokes `handler`.
    #[must_use]
    pub fn new(handler: BoxHandler) -> Self {
        Self { handler }
    }

    /// Invokes the inner handler.
    pub async fn run(self, ctx: Context, request: Payload) -> HandlerResult {
        self.handler.call(ctx, request).await
    }

    /// Returns the inner handler.
    #[must_use]
    pub fn into_handler(self) -> BoxHandler {
        self.handler
    }
}

/// A handler produced by wrapping another handler with a middleware.
struct Wrapped {
    middleware: BoxedMiddleware,
    inner: BoxHandler,
}

impl Handler for Wrapped {
    fn call(&self, ctx: Context, request: Payload) -> BoxFuture<'static, HandlerResult> {
        let middleware = Arc::clone(&self.middleware);
        let next = Next::new(Arc::clone(&self.inner));
        Box::pin(async move { middleware.process(ctx, request, next).await })
    }
}

/// Applies `middleware` to `handler`, producing a new handler.
#[must_use]
pub fn wrap(middleware: BoxedMiddleware, handler: BoxHandler) -> BoxHandler {
    Arc::new(Wrapped {
        middleware,
        inner: handler,
    })
}

/// A middleware built from an async closure.
///
/// # Example
///
/// ```
/// use janus_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |ctx, request, next| async move {
///     let started = std::time::Instant::now();
///     let result = next.run(ctx, request).await;
///     tracing::debug!(elapsed = ?started.elapsed(), "call finished");
///     result
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub fn new<Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(Context, Payload, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self { name, func }
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Payload, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin((self.func)(ctx, request, next))
    }
}
