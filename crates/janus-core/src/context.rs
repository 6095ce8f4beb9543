//! Call context.
//!
//! A [`Context`] travels with every call through the middleware chain and
//! into the handler. It carries a request ID, an optional deadline, a
//! cancellation flag shared by all clones, the [`Transport`] that is serving
//! the call, and a small typed value map for middleware-to-handler data.

use crate::error::StatusError;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

/// A unique identifier for each call, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps IDs sortable in logs.
///
/// # Example
///
/// ```
/// use janus_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID, e.g. one read from a header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a request ID from its hyphenated string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Cancellation state shared by a context and everything derived from it.
#[derive(Debug, Default)]
struct Cancellation {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Per-call context that flows through middleware into handlers.
///
/// Contexts are cheap to clone. Clones share the cancellation state, so
/// cancelling any clone cancels the call for everyone holding it.
///
/// # Example
///
/// ```
/// use janus_core::Context;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let ctx = Context::new().with_timeout(Duration::from_secs(1));
/// assert!(ctx.deadline().is_some());
/// assert!(ctx.err().is_none());
/// # });
/// ```
#[derive(Clone)]
pub struct Context {
    request_id: RequestId,
    transport: Option<Arc<Transport>>,
    deadline: Option<Instant>,
    cancellation: Arc<Cancellation>,
    values: Arc<ValueMap>,
    started_at: std::time::Instant,
}

impl Context {
    /// Creates a fresh root context with a new request ID and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            transport: None,
            deadline: None,
            cancellation: Arc::new(Cancellation::default()),
            values: Arc::new(HashMap::new()),
            started_at: std::time::Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request ID, e.g. with one propagated by the caller.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the transport serving this call, if any.
    #[must_use]
    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_deref()
    }

    /// Attaches a transport.
    ///
    /// A context carries at most one transport. If one is already attached
    /// the existing transport is kept and the new one is discarded.
    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        if let Some(existing) = &self.transport {
            tracing::warn!(
                existing = %existing.kind(),
                discarded = %transport.kind(),
                "context already carries a transport"
            );
            return self;
        }
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets a deadline. An earlier existing deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now. An earlier existing deadline wins.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the time left before the deadline, or `None` without one.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the time since this context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` if the call was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    #[must_use]
    pub fn err(&self) -> Option<StatusError> {
        if self.is_cancelled() {
            return Some(StatusError::canceled("Canceled", "context canceled"));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StatusError::deadline_exceeded(
                "DeadlineExceeded",
                "context deadline exceeded",
            )),
            _ => None,
        }
    }

    /// Completes when the call is cancelled or its deadline passes.
    ///
    /// Never completes for a context without deadline that is never cancelled.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancellation.wait() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancellation.wait().await,
        }
    }

    /// Runs `fut` until it completes or the context is done.
    ///
    /// Returns the context error if the context finished first.
    pub async fn run_until_done<F>(&self, fut: F) -> Result<F::Output, StatusError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            output = fut => Ok(output),
            () = self.done() => Err(self.err().unwrap_or_else(|| {
                StatusError::deadline_exceeded("DeadlineExceeded", "context deadline exceeded")
            })),
        }
    }

    /// Stores a typed value, replacing any previous value of the same type.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Returns a previously stored value of type `T`.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("transport", &self.transport.as_deref().map(Transport::kind))
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("values", &self.values.len())
            .finish()
    }
}
