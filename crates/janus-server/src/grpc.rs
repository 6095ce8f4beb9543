//! gRPC server binding.
//!
//! tonic owns HTTP/2 and message framing; Janus owns what happens around
//! each method. A service implementation forwards every unary method to
//! [`UnaryInterceptor::unary`], which installs the gRPC [`Transport`], runs
//! `[global chain] -> [service chain] -> handler` and turns any failure into
//! a [`tonic::Status`] carrying the structured error.
//!
//! ```ignore
//! #[tonic::async_trait]
//! impl Greeter for GreeterService {
//!     async fn say_hello(
//!         &self,
//!         request: tonic::Request<HelloRequest>,
//!     ) -> Result<tonic::Response<HelloReply>, tonic::Status> {
//!         self.interceptor
//!             .unary::<Self, _, _, _, _>("/helloworld.Greeter/SayHello", request, |_ctx, req: HelloRequest| async move {
//!                 Ok(HelloReply { message: format!("Hello {}", req.name) })
//!             })
//!             .await
//!     }
//! }
//! ```

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use janus_core::{
    typed, BoxError, Context, GrpcTransport, Handler, Payload, ServiceKey, StatusError, Transport,
};
use janus_middleware::{convert, to_grpc_status, Chain};
use tokio::net::TcpListener;
use tonic::body::BoxBody;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;
use tonic::transport::server::TcpIncoming;

use crate::config::ListenConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::ServiceRegistry;
use crate::shutdown::ShutdownSignal;

/// Runs unary gRPC calls through the middleware chains.
///
/// Cheap to clone; every service implementation holds one.
#[derive(Clone, Default)]
pub struct UnaryInterceptor {
    middleware: Chain,
    registry: ServiceRegistry,
    timeout: Option<Duration>,
}

impl UnaryInterceptor {
    /// Creates an interceptor with a global chain and per-service chains.
    #[must_use]
    pub fn new(middleware: Chain, registry: ServiceRegistry) -> Self {
        Self {
            middleware,
            registry,
            timeout: None,
        }
    }

    /// Bounds every call with a deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the per-call timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Handles one unary call for the service implemented by `S`.
    ///
    /// `full_method` is the gRPC path, e.g. `/helloworld.Greeter/SayHello`.
    /// Every error, whatever its type, leaves as a `tonic::Status` with an
    /// `ErrorInfo` detail.
    pub async fn unary<S, Req, Res, F, Fut>(
        &self,
        full_method: &str,
        request: tonic::Request<Req>,
        handler: F,
    ) -> Result<tonic::Response<Res>, tonic::Status>
    where
        S: ?Sized + 'static,
        Req: Send + 'static,
        Res: Send + 'static,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
    {
        let service = ServiceKey::of::<S>();
        let (metadata, _extensions, message) = request.into_parts();

        let transport = GrpcTransport::new(full_method, service).with_metadata(metadata.into_headers());
        let mut ctx = Context::new().with_transport(Transport::Grpc(transport));
        if let Some(timeout) = self.timeout {
            ctx = ctx.with_timeout(timeout);
        }

        let handler = self.middleware.then(self.registry.apply(&service, typed(handler)));

        let result = match ctx
            .run_until_done(handler.call(ctx.clone(), Payload::new(message)))
            .await
        {
            Ok(result) => result,
            Err(status) => return Err(to_grpc_status(&status)),
        };

        match result {
            Ok(reply) => reply
                .into_typed::<Res>()
                .map(tonic::Response::new)
                .map_err(|e| to_grpc_status(&e)),
            Err(err) => Err(into_grpc_status(err)),
        }
    }
}

impl fmt::Debug for UnaryInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryInterceptor")
            .field("middleware", &self.middleware)
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn into_grpc_status(err: BoxError) -> tonic::Status {
    match err.downcast::<tonic::Status>() {
        Ok(status) => *status,
        Err(other) => {
            let status: StatusError = convert(other.as_ref());
            to_grpc_status(&status)
        }
    }
}

/// The gRPC server.
pub struct GrpcServer {
    config: ListenConfig,
    routes: RoutesBuilder,
}

impl GrpcServer {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> GrpcServerBuilder {
        GrpcServerBuilder::default()
    }

    /// Returns the listener configuration.
    #[must_use]
    pub fn config(&self) -> &ListenConfig {
        &self.config
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires.
    ///
    /// In-flight calls get the shutdown timeout to finish.
    pub async fn run_with_listener(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        let incoming = TcpIncoming::from_listener(listener, true, None)
            .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;
        tracing::info!(address = %local_addr, "gRPC server listening");

        let shutdown_timeout = self.config.shutdown_timeout();
        let serve = tonic::transport::Server::builder()
            .timeout(self.config.timeout())
            .add_routes(self.routes.routes())
            .serve_with_incoming_shutdown(incoming, shutdown.recv());
        tokio::pin!(serve);

        let drain_deadline = async {
            shutdown.recv().await;
            tracing::info!("shutdown signal received, stopping gRPC server");
            tokio::time::sleep(shutdown_timeout).await;
        };

        tokio::select! {
            result = &mut serve => result?,
            () = drain_deadline => {
                tracing::warn!("shutdown timeout reached with in-flight gRPC calls");
            }
        }

        tracing::info!("gRPC server stopped");
        Ok(())
    }
}

impl fmt::Debug for GrpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GrpcServer`].
pub struct GrpcServerBuilder {
    config: ListenConfig,
    routes: RoutesBuilder,
}

impl Default for GrpcServerBuilder {
    fn default() -> Self {
        Self {
            config: ListenConfig::grpc(),
            routes: RoutesBuilder::default(),
        }
    }
}

impl GrpcServerBuilder {
    /// Replaces the listener configuration.
    pub fn config(mut self, config: ListenConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies a loaded `server.grpc` section.
    pub fn from_config(self, config: &janus_config::GrpcServerConfig) -> Self {
        let shutdown_timeout = self.config.shutdown_timeout();
        self.config(ListenConfig::from(config).with_shutdown_timeout(shutdown_timeout))
    }

    /// Sets the bind address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config = self.config.with_address(address);
        self
    }

    /// Sets the per-call timeout enforced by the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_shutdown_timeout(timeout);
        self
    }

    /// Adds a tonic service.
    pub fn add_service<S>(mut self, service: S) -> Self
    where
        S: tonic::codegen::Service<
                http::Request<BoxBody>,
                Response = http::Response<BoxBody>,
                Error = Infallible,
            > + NamedService
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        tracing::debug!(service = S::NAME, "gRPC service registered");
        self.routes.add_service(service);
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> GrpcServer {
        GrpcServer {
            config: self.config,
            routes: self.routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::{from_transport, Code};
    use janus_middleware::{from_grpc_status, FnMiddleware, Recovery, StatusServer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SAY_HELLO: &str = "/helloworld.Greeter/SayHello";

    struct Greeter;
    struct Billing;

    async fn say_hello(_ctx: Context, name: String) -> Result<String, BoxError> {
        match name.as_str() {
            "error" => Err(StatusError::invalid_argument("BadRequest", format!("invalid argument {name}")).into()),
            "panic" => panic!("boom"),
            _ => Ok(format!("Hello {name}")),
        }
    }

    fn interceptor() -> UnaryInterceptor {
        UnaryInterceptor::new(
            Chain::new().with(Recovery::new()).with(StatusServer::new()),
            ServiceRegistry::default(),
        )
    }

    #[tokio::test]
    async fn test_unary_success() {
        let reply = interceptor()
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new("janus".to_string()), say_hello)
            .await
            .unwrap();
        assert_eq!(reply.into_inner(), "Hello janus");
    }

    #[tokio::test]
    async fn test_unary_error_carries_detail() {
        let status = interceptor()
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new("error".to_string()), say_hello)
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(
            from_grpc_status(&status),
            StatusError::invalid_argument("BadRequest", "invalid argument error")
        );
    }

    #[tokio::test]
    async fn test_unary_panic_is_contained() {
        let status = interceptor()
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new("panic".to_string()), say_hello)
            .await
            .unwrap_err();

        let err = from_grpc_status(&status);
        assert!(err.is(Code::Unknown));
        assert_eq!(err.reason, "Unknown");
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_unary_translates_without_status_middleware() {
        let status = UnaryInterceptor::default()
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new("error".to_string()), say_hello)
            .await
            .unwrap_err();
        assert_eq!(from_grpc_status(&status).reason, "BadRequest");
    }

    #[tokio::test]
    async fn test_unary_installs_transport() {
        let mut request = tonic::Request::new(());
        request.metadata_mut().insert("x-caller", "tests".parse().unwrap());

        let reply = UnaryInterceptor::default()
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, request, |ctx: Context, (): ()| async move {
                let grpc = from_transport(&ctx)
                    .and_then(Transport::as_grpc)
                    .expect("grpc transport");
                Ok::<_, BoxError>(format!(
                    "{} {} {} {}",
                    grpc.service_name(),
                    grpc.method_name(),
                    grpc.service() == ServiceKey::of::<Greeter>(),
                    grpc.metadata()["x-caller"].to_str().unwrap_or_default(),
                ))
            })
            .await
            .unwrap();

        assert_eq!(reply.into_inner(), "helloworld.Greeter SayHello true tests");
    }

    #[tokio::test]
    async fn test_unary_service_isolation() {
        let billing_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&billing_calls);
        let registry = ServiceRegistry::builder()
            .service::<Billing>(Chain::new().with(FnMiddleware::new("billing", move |ctx, req, next| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(ctx, req).await
                }
            })))
            .build();
        let interceptor = UnaryInterceptor::new(Chain::new(), registry);

        interceptor
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new("a".to_string()), say_hello)
            .await
            .unwrap();
        assert_eq!(billing_calls.load(Ordering::SeqCst), 0);

        interceptor
            .unary::<Billing, _, _, _, _>("/billing.Billing/Charge", tonic::Request::new("b".to_string()), say_hello)
            .await
            .unwrap();
        assert_eq!(billing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unary_deadline() {
        let status = UnaryInterceptor::default()
            .with_timeout(Duration::from_millis(50))
            .unary::<Greeter, _, _, _, _>(SAY_HELLO, tonic::Request::new(()), |_ctx: Context, (): ()| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, BoxError>(())
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
        assert_eq!(from_grpc_status(&status).reason, "DeadlineExceeded");
    }

    #[test]
    fn test_builder_from_config() {
        let section = janus_config::GrpcServerConfig {
            address: "127.0.0.1:19090".to_string(),
            ..Default::default()
        };
        let server = GrpcServer::builder().from_config(&section).build();
        assert_eq!(server.config().address(), "127.0.0.1:19090");
        assert_eq!(server.config().timeout(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_with_listener_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = GrpcServer::builder()
            .shutdown_timeout(Duration::from_millis(100))
            .build();

        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            server.run_with_listener(listener, shutdown),
        )
        .await
        .expect("server should stop");
        assert!(result.is_ok());
    }
}
