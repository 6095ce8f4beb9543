//! End-to-end tests of the HTTP server over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use http::Method;
use janus_core::{BoxError, Context, ServiceKey, StatusError};
use janus_middleware::{Chain, Recovery, StatusServer};
use janus_server::{HttpServer, ShutdownSignal};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Greeter;

#[derive(Deserialize)]
struct HelloRequest {
    name: String,
    #[serde(default)]
    punctuation: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct HelloReply {
    message: String,
}

async fn say_hello(_ctx: Context, req: HelloRequest) -> Result<HelloReply, BoxError> {
    if req.name == "error" {
        return Err(StatusError::invalid_argument("BadRequest", format!("invalid argument {}", req.name)).into());
    }
    Ok(HelloReply {
        message: format!("Hello {}{}", req.name, req.punctuation.unwrap_or_default()),
    })
}

async fn start() -> (SocketAddr, ShutdownSignal, JoinHandle<janus_server::ServerResult<()>>) {
    let server = HttpServer::builder()
        .shutdown_timeout(Duration::from_secs(1))
        .middleware(Chain::new().with(Recovery::new()).with(StatusServer::new()))
        .route(Method::GET, "/helloworld/{name}", ServiceKey::of::<Greeter>(), say_hello)
        .route(Method::POST, "/helloworld", ServiceKey::of::<Greeter>(), say_hello)
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.run_with_listener(listener, shutdown.clone()));
    (addr, shutdown, handle)
}

#[tokio::test]
async fn test_get_with_path_and_query() {
    let (addr, shutdown, handle) = start().await;

    let response = reqwest::get(format!("http://{addr}/helloworld/janus?punctuation=!"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reply: HelloReply = response.json().await.unwrap();
    assert_eq!(reply.message, "Hello janus!");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_post_yaml_body_negotiates_reply() {
    let (addr, shutdown, handle) = start().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/helloworld"))
        .header("content-type", "application/yaml")
        .header("accept", "application/yaml")
        .body("name: yaml\n")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/yaml");
    assert_eq!(response.text().await.unwrap(), "message: Hello yaml\n");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_error_is_structured() {
    let (addr, shutdown, handle) = start().await;

    let response = reqwest::get(format!("http://{addr}/helloworld/error")).await.unwrap();
    assert_eq!(response.status(), 400);
    let err: StatusError = response.json().await.unwrap();
    assert_eq!(err, StatusError::invalid_argument("BadRequest", "invalid argument error"));

    let response = reqwest::get(format!("http://{addr}/nowhere")).await.unwrap();
    assert_eq!(response.status(), 404);
    let err: StatusError = response.json().await.unwrap();
    assert_eq!(err.reason, "NotFound");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, shutdown, handle) = start().await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(reqwest::get(format!("http://{addr}/helloworld/late")).await.is_err());
}
