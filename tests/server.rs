//! Tests over a real TCP listener.

use app_pipeline::app::GREETING;
use app_pipeline::config::AppConfig;

mod common;

#[tokio::test]
async fn test_server_serves_pipeline() {
    let (pipeline, sink) = common::pipeline();
    let server = common::start_server(AppConfig::default(), pipeline).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.text().await.unwrap(), GREETING);

    let response = client.get(server.url("/unknown-path")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].remote_addr.map(|a| a.ip().is_loopback()), Some(true));
    assert!(records[0].request_id.is_some());

    server.stop().await;
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let (pipeline, sink) = common::pipeline();
    let server = common::start_server(AppConfig::default(), pipeline).await;

    let response = reqwest::Client::new()
        .get(server.url("/"))
        .header("x-request-id", "client-chosen-id")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "client-chosen-id"
    );
    assert_eq!(
        sink.records()[0].request_id.as_deref(),
        Some("client-chosen-id")
    );

    server.stop().await;
}

#[tokio::test]
async fn test_placeholder_auth_over_http() {
    let config = AppConfig::default();
    let pipeline = app_pipeline::build_pipeline(
        &config,
        app_pipeline::auth::routes(),
        std::sync::Arc::new(app_pipeline::stages::MemorySink::new()),
    )
    .unwrap();
    let server = common::start_server(config, pipeline).await;

    let response = reqwest::Client::new()
        .post(server.url("/api/auth/sign-up"))
        .json(&serde_json::json!({"email": "a@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 501);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["path"], "/api/auth/sign-up");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let (pipeline, _) = common::pipeline();
    let server = common::start_server(AppConfig::default(), pipeline).await;
    let addr = server.addr;
    server.stop().await;

    assert!(reqwest::get(format!("http://{addr}/")).await.is_err());
}

#[tokio::test]
async fn test_router_adds_request_id_in_process() {
    use tower::ServiceExt;

    let (pipeline, sink) = common::pipeline();
    let server = app_pipeline::HttpServer::new(AppConfig::default(), pipeline);

    let response = server
        .router()
        .oneshot(common::get_request("/"))
        .await
        .unwrap();
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
    assert_eq!(sink.records()[0].request_id.as_deref(), Some(id));
}
