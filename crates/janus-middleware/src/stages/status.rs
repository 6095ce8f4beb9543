//! Status translation middleware.
//!
//! Converts between [`StatusError`] and each transport's native failure
//! representation.
//!
//! # gRPC
//!
//! A `StatusError` becomes a [`tonic::Status`] whose code is the numeric
//! code, whose message is `"{reason}: {message}"`, and whose details carry a
//! `google.rpc.ErrorInfo` with the reason and `{"message": message, "code":
//! code}` metadata. Decoding reads the detail only; the status message is
//! never parsed. The `code` entry keeps codes outside the canonical set
//! intact even though the native status carries `Unknown` for them. A status
//! without `ErrorInfo` decodes to `(code, "", "")`.
//!
//! # HTTP
//!
//! The code maps to an HTTP status through the fixed table in
//! [`janus_core::Code::http_status`] and the body is the serialized error.
//! Any non-2xx response body is decoded back into a `StatusError`.

use crate::middleware::{Middleware, Next};
use http::StatusCode;
use janus_core::{
    BoxError, BoxFuture, Codec, CodecError, Context, HandlerResult, Kind, Payload, StatusError,
    Transport,
};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tonic_types::{ErrorDetails, StatusExt};

/// Metadata key under which the message travels in `ErrorInfo`.
pub const MESSAGE_METADATA_KEY: &str = "message";

/// Metadata key under which the numeric code travels in `ErrorInfo`.
pub const CODE_METADATA_KEY: &str = "code";

/// Encodes a `StatusError` as a gRPC status.
///
/// Codes outside the canonical set are sent as `Unknown` on the status; the
/// raw code rides in the `ErrorInfo` metadata.
#[must_use]
pub fn to_grpc_status(err: &StatusError) -> tonic::Status {
    let metadata = HashMap::from([
        (MESSAGE_METADATA_KEY.to_string(), err.message.clone()),
        (CODE_METADATA_KEY.to_string(), err.code.to_string()),
    ]);
    tonic::Status::with_error_details(
        tonic::Code::from_i32(err.code),
        format!("{}: {}", err.reason, err.message),
        ErrorDetails::with_error_info(err.reason.clone(), "", metadata),
    )
}

/// Decodes a gRPC status into a `StatusError`.
///
/// The code recorded in `ErrorInfo` wins over the native status code.
#[must_use]
pub fn from_grpc_status(status: &tonic::Status) -> StatusError {
    let code = i32::from(status.code());
    let details = status.get_error_details();
    match details.error_info() {
        Some(info) => StatusError::from_raw(
            info.metadata
                .get(CODE_METADATA_KEY)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(code),
            info.reason.clone(),
            info.metadata
                .get(MESSAGE_METADATA_KEY)
                .cloned()
                .unwrap_or_default(),
        ),
        None => StatusError::from_raw(code, "", ""),
    }
}

/// Converts any error into a `StatusError`.
///
/// A `StatusError` is cloned, a `tonic::Status` is decoded, and anything
/// else falls back to `Unknown`.
#[must_use]
pub fn convert(err: &(dyn Error + Send + Sync + 'static)) -> StatusError {
    if let Some(status) = err.downcast_ref::<StatusError>() {
        return status.clone();
    }
    if let Some(status) = err.downcast_ref::<tonic::Status>() {
        return from_grpc_status(status);
    }
    StatusError::from_error(err)
}

/// Encodes a `StatusError` as an HTTP status and body.
pub fn encode_http(err: &StatusError, codec: &dyn Codec) -> Result<(StatusCode, Vec<u8>), CodecError> {
    Ok((err.http_status(), codec.marshal(err)?))
}

/// Decodes an HTTP response into a `StatusError`.
///
/// Returns `Ok(None)` for 2xx statuses. A non-2xx body that cannot be
/// decoded is reported as a codec error.
pub fn decode_http(
    status: StatusCode,
    codec: &dyn Codec,
    body: &[u8],
) -> Result<Option<StatusError>, CodecError> {
    if status.is_success() {
        return Ok(None);
    }
    codec.unmarshal::<StatusError>(body).map(Some)
}

/// Reclassifies a normalized error before it is encoded.
pub type StatusHandler = Arc<dyn Fn(&Context, StatusError) -> StatusError + Send + Sync>;

/// Server-side status middleware.
///
/// Normalizes every error to a `StatusError`, applies the optional
/// handler, and for gRPC calls returns the native `tonic::Status`. HTTP
/// calls keep the `StatusError`; the HTTP error encoder renders it.
#[derive(Clone, Default)]
pub struct StatusServer {
    handler: Option<StatusHandler>,
}

impl StatusServer {
    /// Creates server-side status translation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a reclassification handler.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Context, StatusError) -> StatusError + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    fn translate(&self, ctx: &Context, err: &BoxError) -> BoxError {
        let mut status = convert(err.as_ref());
        if let Some(handler) = &self.handler {
            status = handler(ctx, status);
        }
        match ctx.transport().map(Transport::kind) {
            Some(Kind::Grpc) => Box::new(to_grpc_status(&status)),
            Some(Kind::Http) | None => Box::new(status),
        }
    }
}

impl fmt::Debug for StatusServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusServer")
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

impl Middleware for StatusServer {
    fn name(&self) -> &'static str {
        "status_server"
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            next.run(ctx.clone(), request)
                .await
                .map_err(|err| self.translate(&ctx, &err))
        })
    }
}

/// Client-side status middleware.
///
/// Decodes native failures (a `tonic::Status` from a gRPC call) back into a
/// `StatusError`. Every error leaving this middleware is a `StatusError`.
#[derive(Clone, Default)]
pub struct StatusClient {
    handler: Option<StatusHandler>,
}

impl StatusClient {
    /// Creates client-side status translation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a reclassification handler applied after decoding.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Context, StatusError) -> StatusError + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusClient")
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

impl Middleware for StatusClient {
    fn name(&self) -> &'static str {
        "status_client"
    }

    fn process<'a>(
        &'a self,
        ctx: Context,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            next.run(ctx.clone(), request).await.map_err(|err| {
                let mut status = convert(err.as_ref());
                if let Some(handler) = &self.handler {
                    status = handler(&ctx, status);
                }
                Box::new(status) as BoxError
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use janus_core::{BoxHandler, Code, GrpcTransport, HttpTransport, JsonCodec, ServiceKey};

    struct Greeter;

    #[derive(Debug)]
    struct Plain;

    impl fmt::Display for Plain {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk on fire")
        }
    }

    impl Error for Plain {}

    fn failing(err: fn() -> BoxError) -> BoxHandler {
        Arc::new(move |_ctx: Context, _request: Payload| async move { Err::<Payload, BoxError>(err()) })
    }

    fn grpc_ctx() -> Context {
        Context::new().with_transport(Transport::Grpc(GrpcTransport::new(
            "/helloworld.Greeter/SayHello",
            ServiceKey::of::<Greeter>(),
        )))
    }

    #[test]
    fn test_grpc_encoding_shape() {
        let err = StatusError::invalid_argument("BadRequest", "invalid argument x");
        let status = to_grpc_status(&err);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "BadRequest: invalid argument x");

        let details = status.get_error_details();
        let info = details.error_info().unwrap();
        assert_eq!(info.reason, "BadRequest");
        assert_eq!(info.metadata.get("message").unwrap(), "invalid argument x");
    }

    #[test]
    fn test_grpc_decode_ignores_description() {
        let status = tonic::Status::new(tonic::Code::NotFound, "Fake: reason in text");
        let decoded = from_grpc_status(&status);
        assert_eq!(decoded, StatusError::from_raw(5, "", ""));
        assert!(decoded.is_degraded());
    }

    #[test]
    fn test_unmapped_code_is_unknown_on_the_wire_but_kept_in_detail() {
        let err = StatusError::from_raw(77, "Custom", "custom failure");
        let status = to_grpc_status(&err);
        assert_eq!(status.code(), tonic::Code::Unknown);

        let details = status.get_error_details();
        assert_eq!(details.error_info().unwrap().metadata.get("code").unwrap(), "77");
        assert_eq!(from_grpc_status(&status), err);
    }

    #[test]
    fn test_unparseable_detail_code_falls_back_to_status_code() {
        let metadata = HashMap::from([
            (MESSAGE_METADATA_KEY.to_string(), "gone".to_string()),
            (CODE_METADATA_KEY.to_string(), "not-a-number".to_string()),
        ]);
        let status = tonic::Status::with_error_details(
            tonic::Code::NotFound,
            "Missing: gone",
            ErrorDetails::with_error_info("Missing", "", metadata),
        );
        assert_eq!(from_grpc_status(&status), StatusError::not_found("Missing", "gone"));
    }

    #[test]
    fn test_convert_fallback() {
        let err: BoxError = Box::new(Plain);
        let status = convert(err.as_ref());
        assert_eq!(status.code, 2);
        assert_eq!(status.reason, "Unknown");
        assert_eq!(status.message, "Unknown: disk on fire");
    }

    #[test]
    fn test_http_encoding() {
        let codec = JsonCodec;
        let err = StatusError::not_found("UserMissing", "no user 7");
        let (status, body) = encode_http(&err, &codec).unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(decode_http(status, &codec, &body).unwrap(), Some(err));
        assert_eq!(decode_http(StatusCode::OK, &codec, b"{}").unwrap(), None);
        assert!(decode_http(StatusCode::BAD_GATEWAY, &codec, b"<html>").is_err());
    }

    #[tokio::test]
    async fn test_server_grpc_returns_native_status() {
        let handler = Chain::new().with(StatusServer::new()).then(failing(|| {
            Box::new(StatusError::invalid_argument("BadRequest", "invalid argument x"))
        }));
        let err = handler.call(grpc_ctx(), Payload::new(())).await.unwrap_err();
        let status = err.downcast_ref::<tonic::Status>().unwrap();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(from_grpc_status(status).message, "invalid argument x");
    }

    #[tokio::test]
    async fn test_server_http_returns_status_error() {
        let ctx = Context::new().with_transport(Transport::Http(HttpTransport::default()));
        let handler = Chain::new()
            .with(StatusServer::new())
            .then(failing(|| Box::new(Plain)));
        let err = handler.call(ctx, Payload::new(())).await.unwrap_err();
        let status = err.downcast_ref::<StatusError>().unwrap();
        assert!(status.is(Code::Unknown));
        assert_eq!(status.reason, "Unknown");
    }

    #[tokio::test]
    async fn test_server_custom_handler() {
        let server = StatusServer::new().with_handler(|_ctx, mut err| {
            if err.reason == "Unknown" {
                err.code = Code::Internal.as_i32();
                err.reason = "Internal".to_string();
            }
            err
        });
        let handler = Chain::new().with(server).then(failing(|| Box::new(Plain)));
        let err = handler.call(Context::new(), Payload::new(())).await.unwrap_err();
        assert!(err.downcast_ref::<StatusError>().unwrap().is(Code::Internal));
    }

    #[tokio::test]
    async fn test_client_decodes_native_status() {
        let handler = Chain::new().with(StatusClient::new()).then(failing(|| {
            Box::new(to_grpc_status(&StatusError::unauthenticated(
                "TokenExpired",
                "token expired",
            )))
        }));
        let err = handler.call(Context::new(), Payload::new(())).await.unwrap_err();
        assert_eq!(
            *err.downcast_ref::<StatusError>().unwrap(),
            StatusError::unauthenticated("TokenExpired", "token expired")
        );
    }
}
