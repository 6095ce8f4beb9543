//! gRPC client.
//!
//! Wraps a tonic [`Channel`]. Every unary call runs
//! `[recovery] -> [status decode] -> [user middleware] -> channel` inside
//! the client timeout, so callers only ever see a [`StatusError`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::uri::PathAndQuery;
use janus_core::{typed, BoxError, Context, GrpcTransport, Handler, Payload, ServiceKey, StatusError, Transport};
use janus_middleware::{Chain, Recovery, StatusClient};
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};

use crate::error::{ClientError, ClientResult};

/// Default per-call timeout.
pub const DEFAULT_GRPC_TIMEOUT: Duration = Duration::from_millis(500);

/// A gRPC client bound to one channel.
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct GrpcClient {
    channel: Channel,
    timeout: Duration,
    middleware: Chain,
}

impl GrpcClient {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> GrpcClientBuilder {
        GrpcClientBuilder::default()
    }

    /// Returns the underlying channel, for use with generated clients.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs a unary call to `full_method`, e.g. `/helloworld.Greeter/SayHello`.
    ///
    /// Request metadata is visible to middleware through the transport.
    pub async fn invoke<Req, Res>(&self, full_method: &str, request: tonic::Request<Req>) -> Result<Res, StatusError>
    where
        Req: prost::Message + 'static,
        Res: prost::Message + Default + 'static,
    {
        let path = PathAndQuery::from_str(full_method)
            .map_err(|e| StatusError::invalid_argument("InvalidMethod", format!("{full_method}: {e}")))?;

        let (metadata, _extensions, message) = request.into_parts();
        let transport = GrpcTransport::new(full_method, ServiceKey::of::<Self>()).with_metadata(metadata.into_headers());
        let ctx = Context::new()
            .with_transport(Transport::Grpc(transport))
            .with_timeout(self.timeout);

        let channel = self.channel.clone();
        let timeout = self.timeout;
        let terminal = typed(move |ctx: Context, message: Req| {
            let mut grpc = tonic::client::Grpc::new(channel.clone());
            let path = path.clone();
            async move {
                grpc.ready()
                    .await
                    .map_err(|e| tonic::Status::unavailable(format!("channel not ready: {e}")))?;

                let mut request = tonic::Request::new(message);
                if let Some(metadata) = ctx.transport().and_then(Transport::as_grpc).map(GrpcTransport::metadata) {
                    *request.metadata_mut() = tonic::metadata::MetadataMap::from_headers(metadata.clone());
                }
                request.set_timeout(ctx.remaining().unwrap_or(timeout));

                let response = grpc
                    .unary::<Req, Res, _>(request, path, ProstCodec::default())
                    .await?;
                Ok::<_, BoxError>(response.into_inner())
            }
        });
        let handler = self.middleware.then(terminal);

        let reply = ctx
            .run_until_done(handler.call(ctx.clone(), Payload::new(message)))
            .await?
            .map_err(StatusError::from_boxed)?;
        reply.into_typed::<Res>()
    }
}

impl fmt::Debug for GrpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcClient")
            .field("timeout", &self.timeout)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GrpcClient`].
#[derive(Debug)]
pub struct GrpcClientBuilder {
    endpoint: Option<String>,
    timeout: Duration,
    insecure: bool,
    middleware: Chain,
}

impl Default for GrpcClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: DEFAULT_GRPC_TIMEOUT,
            insecure: false,
            middleware: Chain::new(),
        }
    }
}

impl GrpcClientBuilder {
    /// Applies a loaded `client.grpc` section.
    pub fn from_config(mut self, config: &janus_config::GrpcClientConfig) -> Self {
        if let Some(endpoint) = &config.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        self.timeout = Duration::from_millis(config.timeout_ms);
        self.insecure = config.insecure;
        self
    }

    /// Sets the target, e.g. `127.0.0.1:9000`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-call timeout, also used to bound connection setup.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Uses plaintext HTTP/2.
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// Sets the client middleware, run inside recovery and status decoding.
    pub fn middleware(mut self, chain: Chain) -> Self {
        self.middleware = chain;
        self
    }

    /// Connects eagerly, failing if the target is unreachable.
    pub async fn connect(self) -> ClientResult<GrpcClient> {
        let endpoint = self.resolve_endpoint()?;
        let channel = endpoint.connect().await?;
        Ok(self.finish(channel))
    }

    /// Creates a client that connects on first use.
    pub fn connect_lazy(self) -> ClientResult<GrpcClient> {
        let channel = self.resolve_endpoint()?.connect_lazy();
        Ok(self.finish(channel))
    }

    fn resolve_endpoint(&self) -> ClientResult<Endpoint> {
        let target = self.endpoint.as_deref().ok_or(ClientError::MissingEndpoint)?;
        let uri = if target.contains("://") {
            target.to_string()
        } else if self.insecure {
            format!("http://{target}")
        } else {
            format!("https://{target}")
        };
        let endpoint = Endpoint::from_shared(uri).map_err(|e| ClientError::invalid_endpoint(target, e))?;
        Ok(endpoint.connect_timeout(self.timeout).timeout(self.timeout))
    }

    fn finish(self, channel: Channel) -> GrpcClient {
        GrpcClient {
            channel,
            timeout: self.timeout,
            middleware: Chain::new()
                .with(Recovery::new())
                .with(StatusClient::new())
                .extend(&self.middleware),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::{from_transport, Code, HandlerResult};
    use janus_middleware::{FnMiddleware, Next};

    #[derive(Clone, PartialEq, prost::Message)]
    struct Ping {
        #[prost(string, tag = "1")]
        name: String,
    }

    async fn explode(_ctx: Context, _req: Payload, _next: Next) -> HandlerResult {
        panic!("interceptor boom")
    }

    fn lazy(chain: Chain) -> GrpcClient {
        GrpcClient::builder()
            .endpoint("127.0.0.1:1")
            .insecure()
            .middleware(chain)
            .connect_lazy()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let builder = GrpcClient::builder();
        assert_eq!(builder.timeout, Duration::from_millis(500));
        assert!(!builder.insecure);
        assert!(matches!(builder.resolve_endpoint(), Err(ClientError::MissingEndpoint)));
    }

    #[test]
    fn test_insecure_endpoint_is_plaintext() {
        let plain = GrpcClient::builder().endpoint("127.0.0.1:9000").insecure().resolve_endpoint().unwrap();
        assert_eq!(plain.uri().scheme_str(), Some("http"));
    }

    #[test]
    fn test_from_config() {
        let config = janus_config::GrpcClientConfig {
            endpoint: Some("127.0.0.1:9000".to_string()),
            timeout_ms: 250,
            insecure: true,
        };
        let builder = GrpcClient::builder().from_config(&config);
        assert_eq!(builder.timeout, Duration::from_millis(250));
        let endpoint = builder.resolve_endpoint().unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("http"));
        assert_eq!(endpoint.uri().port_u16(), Some(9000));
    }

    #[tokio::test]
    async fn test_middleware_sees_transport_and_short_circuits() {
        let client = lazy(Chain::new().with(FnMiddleware::new("stub", |ctx, _req, _next| async move {
            let grpc = from_transport(&ctx)
                .and_then(Transport::as_grpc)
                .expect("grpc transport");
            assert_eq!(grpc.service_name(), "helloworld.Greeter");
            assert_eq!(grpc.metadata()["x-caller"], "tests");
            Ok::<_, BoxError>(Payload::new(Ping {
                name: "stubbed".to_string(),
            }))
        })));
        assert_eq!(client.middleware.names(), vec!["recovery", "status_client", "stub"]);

        let mut request = tonic::Request::new(Ping::default());
        request.metadata_mut().insert("x-caller", "tests".parse().unwrap());
        let reply: Ping = client.invoke("/helloworld.Greeter/SayHello", request).await.unwrap();
        assert_eq!(reply.name, "stubbed");
    }

    #[tokio::test]
    async fn test_interceptor_panic_is_classified() {
        let client = lazy(Chain::new().with(FnMiddleware::new("explode", explode)));
        let err = client
            .invoke::<Ping, Ping>("/helloworld.Greeter/SayHello", tonic::Request::new(Ping::default()))
            .await
            .unwrap_err();
        assert!(err.is(Code::Unknown));
        assert!(err.message.contains("interceptor boom"));
    }

    #[tokio::test]
    async fn test_native_status_is_decoded() {
        let client = lazy(Chain::new().with(FnMiddleware::new("reject", |_ctx, _req, _next| async move {
            let status = janus_middleware::to_grpc_status(&StatusError::permission_denied("NoAccess", "nope"));
            Err::<Payload, BoxError>(Box::new(status))
        })));
        let err = client
            .invoke::<Ping, Ping>("/helloworld.Greeter/SayHello", tonic::Request::new(Ping::default()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusError::permission_denied("NoAccess", "nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_deadline() {
        let client = lazy(Chain::new().with(FnMiddleware::new("slow", |ctx, req, next| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            next.run(ctx, req).await
        })));
        let err = client
            .invoke::<Ping, Ping>("/helloworld.Greeter/SayHello", tonic::Request::new(Ping::default()))
            .await
            .unwrap_err();
        assert!(err.is(Code::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_classified() {
        let client = lazy(Chain::new());
        let err = client
            .invoke::<Ping, Ping>("/helloworld.Greeter/SayHello", tonic::Request::new(Ping::default()))
            .await
            .unwrap_err();
        assert_ne!(err.code, 0);
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let client = lazy(Chain::new());
        let err = client
            .invoke::<Ping, Ping>("not a path", tonic::Request::new(Ping::default()))
            .await
            .unwrap_err();
        assert!(err.is(Code::InvalidArgument));
    }
}
