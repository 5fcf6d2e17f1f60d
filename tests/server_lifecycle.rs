//! Server bootstrap tests: lifecycle, fallbacks, recovery and file sinks.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use trellis::config::ServerConfig;
use trellis::observability::TRACE_HEADER;
use trellis::{HttpServer, ServerError};

mod common;

fn routes() -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/boom", get(boom))
}

async fn boom() -> &'static str {
    panic!("handler exploded")
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_start_before_init_fails() {
    let server = HttpServer::new(ServerConfig::default()).routes(routes());
    assert!(matches!(server.start().await, Err(ServerError::NotInitialized)));
}

#[tokio::test]
async fn test_double_init_does_not_reinstall_middleware() {
    let (mut server, mut sinks) = common::channel_server(ServerConfig::default(), routes());

    let (loggers, _other) = common::channel_loggers();
    assert!(matches!(
        server.init_with_loggers(loggers),
        Err(ServerError::AlreadyInitialized)
    ));

    let request = Request::get("/ping").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    to_bytes(response.into_body(), usize::MAX).await.unwrap();

    common::next_record(&mut sinks.request).await;
    common::assert_no_record(&mut sinks.request).await;
}

#[tokio::test]
async fn test_unmatched_route_and_method_use_not_found() {
    let (server, mut sinks) = common::channel_server(ServerConfig::default(), routes());

    let request = Request::get("/missing").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], 404);

    let request = Request::post("/ping").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "no route for /ping");

    let first = common::next_record(&mut sinks.request).await;
    let second = common::next_record(&mut sinks.request).await;
    assert_eq!(first.context.get("status_code"), Some(&json!(404)));
    assert_eq!(second.context.get("status_code"), Some(&json!(404)));
}

#[tokio::test]
async fn test_custom_not_found_handler() {
    let (loggers, _sinks) = common::channel_loggers();
    let mut server = HttpServer::new(ServerConfig::default())
        .routes(routes())
        .not_found_handler(|| async { (StatusCode::IM_A_TEAPOT, "nothing here") });
    server.init_with_loggers(loggers).unwrap();

    let request = Request::get("/missing").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn test_panic_recovered_and_logged() {
    let (server, mut sinks) = common::channel_server(ServerConfig::default(), routes());

    let request = Request::get("/boom")
        .header(TRACE_HEADER, "panic-trace")
        .body(Body::empty())
        .unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], 500);

    let system = common::next_record(&mut sinks.system).await;
    assert_eq!(system.level, tracing::Level::ERROR);
    assert_eq!(system.context.get("panic"), Some(&json!("handler exploded")));
    assert_eq!(system.context.get("trace_id"), Some(&json!("panic-trace")));

    let request_record = common::next_record(&mut sinks.request).await;
    assert_eq!(request_record.context.get("status_code"), Some(&json!(500)));

    // The server keeps serving after a panic.
    let request = Request::get("/ping").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_custom_recover_handler() {
    let (loggers, mut sinks) = common::channel_loggers();
    let mut server = HttpServer::new(ServerConfig::default())
        .routes(routes())
        .recover_handler(|_| (StatusCode::SERVICE_UNAVAILABLE, "recovered").into_response());
    server.init_with_loggers(loggers).unwrap();

    let request = Request::get("/boom").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    to_bytes(response.into_body(), usize::MAX).await.unwrap();

    common::next_record(&mut sinks.request).await;
    common::assert_no_record(&mut sinks.system).await;
}

#[tokio::test]
async fn test_file_sinks_receive_request_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        log_path: dir.path().to_string_lossy().into_owned(),
        system_name: "orders".into(),
        debug: true,
        ..ServerConfig::default()
    };
    let mut server = HttpServer::new(config).routes(routes());
    server.init().unwrap();

    let request = Request::get("/ping?a=1").body(Body::empty()).unwrap();
    let response = server.router().unwrap().oneshot(request).await.unwrap();
    to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let path = dir.path().join("orders").join("request_orders.log");
    let mut line = String::new();
    for _ in 0..50 {
        line = std::fs::read_to_string(&path).unwrap();
        if !line.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let record: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(record["message"], "REQUEST LOG");
    assert_eq!(record["level"], "info");
    assert_eq!(record["context"]["request_body"], json!({"a": "1"}));
    assert!(dir.path().join("orders").join("app_orders.log").exists());
    assert!(dir.path().join("orders").join("system_orders.log").exists());
}

#[tokio::test]
async fn test_serve_real_listener() {
    let (server, mut sinks) = common::channel_server(ServerConfig::default(), routes());
    let shutdown = server.shutdown().clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move { server.serve(listener).await });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{}/ping", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "pong");
    drop(client);

    let record = common::next_record(&mut sinks.request).await;
    assert_eq!(record.context.get("refer_request_host"), Some(&json!("127.0.0.1")));

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_serve_after_trigger_stops_immediately() {
    let (server, _sinks) = common::channel_server(ServerConfig::default(), routes());
    server.shutdown().trigger();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server.serve(listener))
        .await
        .expect("server did not stop");
    assert!(result.is_ok());
}
