//! Running several servers as one application.
//!
//! An [`App`] owns a set of [`Server`]s and one [`ShutdownSignal`]. All
//! servers start together; the first one to stop, for any reason, triggers
//! shutdown of the others.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_server::{App, GrpcServer, HttpServer};
//!
//! App::new()
//!     .server(HttpServer::builder().address("0.0.0.0:8000").build()?)
//!     .server(GrpcServer::builder().address("0.0.0.0:9000").add_service(greeter).build())
//!     .run()
//!     .await?;
//! ```

use std::fmt;

use janus_core::BoxFuture;
use tokio::task::JoinSet;

use crate::error::{ServerError, ServerResult};
use crate::grpc::GrpcServer;
use crate::http::HttpServer;
use crate::shutdown::ShutdownSignal;

/// A server that can be started by an [`App`].
pub trait Server: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Serves until `shutdown` fires, then stops gracefully.
    fn start(self: Box<Self>, shutdown: ShutdownSignal) -> BoxFuture<'static, ServerResult<()>>;
}

impl Server for HttpServer {
    fn name(&self) -> &'static str {
        "http"
    }

    fn start(self: Box<Self>, shutdown: ShutdownSignal) -> BoxFuture<'static, ServerResult<()>> {
        Box::pin(async move { self.run_with_shutdown(shutdown).await })
    }
}

impl Server for GrpcServer {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn start(self: Box<Self>, shutdown: ShutdownSignal) -> BoxFuture<'static, ServerResult<()>> {
        Box::pin(async move { self.run_with_shutdown(shutdown).await })
    }
}

/// A set of servers sharing one shutdown signal.
#[must_use]
#[derive(Default)]
pub struct App {
    servers: Vec<Box<dyn Server>>,
    shutdown: Option<ShutdownSignal>,
}

impl App {
    /// Creates an application with no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a server.
    pub fn server(mut self, server: impl Server) -> Self {
        self.servers.push(Box::new(server));
        self
    }

    /// Uses `shutdown` instead of OS signals.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Starts every server and waits until all of them stopped.
    ///
    /// Returns the first server error, if any.
    pub async fn run(self) -> ServerResult<()> {
        let shutdown = self.shutdown.unwrap_or_else(ShutdownSignal::with_os_signals);

        let mut tasks = JoinSet::new();
        for server in self.servers {
            let name = server.name();
            let shutdown = shutdown.clone();
            tracing::info!(server = name, "starting server");
            tasks.spawn(async move { (name, server.start(shutdown).await) });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((name, Ok(()))) => {
                    tracing::info!(server = name, "server stopped");
                    None
                }
                Ok((name, Err(e))) => {
                    tracing::error!(server = name, error = %e, "server failed");
                    Some(e)
                }
                Err(e) => {
                    tracing::error!(error = %e, "server task aborted");
                    Some(ServerError::Task(e.to_string()))
                }
            };

            if !shutdown.is_shutdown() {
                tracing::info!("a server stopped, shutting down the others");
                shutdown.trigger();
            }
            if first_error.is_none() {
                first_error = failure;
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("servers", &self.servers.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Waiting {
        stopped: Arc<AtomicUsize>,
    }

    impl Server for Waiting {
        fn name(&self) -> &'static str {
            "waiting"
        }

        fn start(self: Box<Self>, shutdown: ShutdownSignal) -> BoxFuture<'static, ServerResult<()>> {
            Box::pin(async move {
                shutdown.recv().await;
                self.stopped.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    struct Failing;

    impl Server for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn start(self: Box<Self>, _shutdown: ShutdownSignal) -> BoxFuture<'static, ServerResult<()>> {
            Box::pin(async { Err(ServerError::UnsupportedNetwork("unix".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_trigger_stops_all_servers() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let shutdown = ShutdownSignal::new();

        let app = App::new()
            .server(Waiting { stopped: Arc::clone(&stopped) })
            .server(Waiting { stopped: Arc::clone(&stopped) })
            .with_shutdown(shutdown.clone());
        let running = tokio::spawn(app.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_stops_the_others() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let shutdown = ShutdownSignal::new();

        let result = App::new()
            .server(Waiting { stopped: Arc::clone(&stopped) })
            .server(Failing)
            .with_shutdown(shutdown.clone())
            .run()
            .await;

        assert!(matches!(result, Err(ServerError::UnsupportedNetwork(_))));
        assert!(shutdown.is_shutdown());
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_app_returns() {
        let result = App::new().with_shutdown(ShutdownSignal::new()).run().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_runs_http_and_grpc_servers() {
        let http = HttpServer::builder().address("127.0.0.1:0").build().unwrap();
        let grpc = GrpcServer::builder().address("127.0.0.1:0").build();
        let shutdown = ShutdownSignal::new();

        let app = App::new().server(http).server(grpc).with_shutdown(shutdown.clone());
        assert_eq!(format!("{app:?}"), r#"App { servers: ["http", "grpc"], .. }"#);

        let running = tokio::spawn(app.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
