//! Access logging middleware.
//!
//! Emits one structured record per call after the inner handler returns.
//! Successful calls log at INFO, failed calls at ERROR. The middleware never
//! changes the result.
//!
//! # Fields
//!
//! | Transport | Fields |
//! |---|---|
//! | gRPC | `system=grpc`, `kind`, `grpc.service`, `grpc.method`, `grpc.code`, `grpc.error` |
//! | HTTP | `system=http`, `kind`, `http.method`, `http.path`, `http.code`, `http.error` |
//!
//! Every record also carries `request_id` and `latency_ms`.

use crate::middleware::{Middleware, Next};
use crate::stages::status::convert;
use janus_core::{BoxError, BoxFuture, Context, HandlerResult, Payload, Transport};
use std::fmt;
use std::time::Instant;

/// Which side of the call is logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Inbound calls handled by this process.
    Server,
    /// Outbound calls made by this process.
    Client,
}

impl Side {
    /// Returns the value of the `kind` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access logging middleware.
#[derive(Debug, Clone, Copy)]
pub struct Logging {
    side: Side,
}

impl Logging {
    /// Logging for inbound calls.
    #[must_use]
    pub const fn server() -> Self {
        Self { side: Side::Server }
    }

    /// Logging for outbound calls.
    #[must_use]
    pub const fn client() -> Self {
        Self { side: Side::Client }
    }

    /// Returns the side this middleware logs for.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    fn record(&self, ctx: &Context, error: Option<&BoxError>, latency_ms: f64) {
        let kind = self.side.as_str();
        let request_id = ctx.request_id();
        let status = error.map(|err| convert(err.as_ref()));

        match ctx.transport() {
            Some(Transport::Grpc(grpc)) => {
                let code = status.as_ref().map_or(0, |s| s.code);
                if let Some(err) = error {
                    tracing::error!(
                        system = "grpc",
                        kind,
                        %request_id,
                        grpc.service = grpc.service_name(),
                        grpc.method = grpc.method_name(),
                        grpc.code = code,
                        grpc.error = %err,
                        latency_ms,
                        "grpc call failed"
                    );
                } else {
                    tracing::info!(
                        system = "grpc",
                        kind,
                        %request_id,
                        grpc.service = grpc.service_name(),
                        grpc.method = grpc.method_name(),
                        grpc.code = code,
                        latency_ms,
                        "grpc call"
                    );
                }
            }
            Some(Transport::Http(http)) => {
                let code = status.as_ref().map_or(200, |s| s.http_status().as_u16());
                if let Some(err) = error {
                    tracing::error!(
                        system = "http",
                        kind,
                        %request_id,
                        http.method = %http.method(),
                        http.path = http.path(),
                        http.code = code,
                        http.error = %err,
                        latency_ms,
                        "http call failed"
                    );
                } else {
                    tracing::info!(
                        system = "http",
                        kind,
                        %request_id,
                        http.method = %http.method(),
                        http.path = http.path(),
                        http.code = code,
                        latency_ms,
                        "http call"
                    );
                }
            }
            None => {
                let code = status.as_ref().map_or(0, |s| s.code);
                if let Some(err) = error {
                    tracing::error!(kind, %request_id, code, error = %err, latency_ms, "call failed");
                } else {
                    tracing::info!(kind, %request_id, code, latency_ms, "call");
                }
            }
        }
    }
}

impl Middleware for Logging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let started = Instant::now();
            let result = next.run(ctx.clone(), request).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.record(&ctx, result.as_ref().err(), latency_ms);
            result
        })
    }
}
