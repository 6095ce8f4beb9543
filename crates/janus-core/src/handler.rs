//! Handler abstraction.
//!
//! Middleware operates on opaque payloads so that one chain can wrap
//! handlers of any request and response type. A [`Payload`] owns a value of
//! some concrete type; the [`Handler`] trait maps a context and request
//! payload to a response payload or an error.
//!
//! Typed handlers are adapted with [`typed`].

use crate::context::Context;
use crate::error::{BoxError, StatusError};
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The result of running a handler.
pub type HandlerResult = Result<Payload, BoxError>;

/// An owned, type-erased request or response value.
pub struct Payload {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Payload {
    /// Wraps a value.
    #[must_use]
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the name of the wrapped type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the payload holds a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the value out as `T`, handing the payload back on mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|value| Self { value, type_name })
    }

    /// Takes the value out as `T`, or fails with an `Internal` error naming
    /// both types.
    pub fn into_typed<T: Any>(self) -> Result<T, StatusError> {
        self.downcast::<T>().map_err(|payload| {
            StatusError::internal(
                "PayloadMismatch",
                format!(
                    "expected payload of type {}, got {}",
                    type_name::<T>(),
                    payload.type_name
                ),
            )
        })
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A type-erased call handler.
///
/// Implemented for every `Fn(Context, Payload) -> Future<Output = HandlerResult>`
/// closure, so most handlers are written as closures.
pub trait Handler: Send + Sync + 'static {
    /// Handles one call.
    fn call(&self, ctx: Context, request: Payload) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context, request: Payload) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx, request))
    }
}

/// A shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Adapts a typed async function into a [`BoxHandler`].
///
/// The request payload is unwrapped as `Req` and the response is wrapped
/// back into a payload. A request payload of the wrong type fails with an
/// `Internal` error.
///
/// # Example
///
/// ```
/// use janus_core::{typed, BoxError, Context, Handler, Payload};
///
/// # tokio_test::block_on(async {
/// let handler = typed(|_ctx: Context, name: String| async move {
///     Ok::<_, BoxError>(format!("Hello {name}"))
/// });
/// let reply = handler.call(Context::new(), Payload::new("janus".to_string())).await.unwrap();
/// assert_eq!(reply.downcast::<String>().unwrap(), "Hello janus");
/// # });
/// ```
pub fn typed<Req, Res, F, Fut>(f: F) -> BoxHandler
where
    Req: Any + Send,
    Res: Any + Send,
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx: Context, request: Payload| {
        let f = Arc::clone(&f);
        async move {
            let request = request.into_typed::<Req>()?;
            let response = f(ctx, request).await?;
            Ok::<_, BoxError>(Payload::new(response))
        }
    })
}
