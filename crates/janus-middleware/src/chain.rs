//! Ordered middleware chains.
//!
//! A [`Chain`] of `[m1, m2, ..., mn]` applied to a handler `h` behaves as
//! `m1(m2(...mn(h)))`: `m1` sees the call first and the result last. The
//! empty chain is the identity.
//!
//! ```text
//! call → m1 → m2 → ... → mn → handler
//!                                ↓
//! result ← m1 ← m2 ← ... ← mn ←──┘
//! ```

use crate::middleware::{wrap, BoxedMiddleware, Middleware, Next};
use janus_core::{BoxFuture, BoxHandler, Context, HandlerResult, Payload};
use std::fmt;
use std::sync::Arc;

/// An ordered, immutable-once-built list of middleware.
///
/// # Example
///
/// ```
/// use janus_middleware::{Chain, Recovery, Logging};
///
/// let chain = Chain::new().with(Recovery::new()).with(Logging::server());
/// assert_eq!(chain.names(), vec!["recovery", "logging"]);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<BoxedMiddleware>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware; it runs inside every middleware already added.
    #[must_use]
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    #[must_use]
    pub fn with_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Appends every middleware of `other`, keeping their order.
    #[must_use]
    pub fn extend(mut self, other: &Chain) -> Self {
        self.middlewares.extend(other.middlewares.iter().cloned());
        self
    }

    /// Applies the chain to a terminal handler.
    ///
    /// Wrapping starts from the innermost middleware so that the first one
    /// added ends up outermost. An empty chain returns `handler` itself.
    #[must_use]
    pub fn then(&self, handler: BoxHandler) -> BoxHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |next, middleware| wrap(Arc::clone(middleware), next))
    }

    /// Returns the middleware names in invocation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if the chain has no middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self {
            middlewares: iter.into_iter().collect(),
        }
    }
}

impl Middleware for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        let handler = self.then(next.into_handler());
        Box::pin(async move { handler.call(ctx, request).await })
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("middlewares", &self.names())
            .finish()
    }
}
