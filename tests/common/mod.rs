//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use app_pipeline::config::AppConfig;
use app_pipeline::stages::{Cookies, MemorySink, ParsedBody};
use app_pipeline::{build_pipeline, HttpServer, Pipeline, Shutdown};
use axum::{
    body::Body,
    http::Request,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Auth stand-in that reports what the shared stages attached.
pub fn echo_auth() -> Router {
    async fn echo(
        Extension(body): Extension<ParsedBody>,
        Extension(cookies): Extension<Cookies>,
        raw: String,
    ) -> Json<Value> {
        Json(json!({
            "body": body.0,
            "session": cookies.get("session"),
            "raw_len": raw.len(),
        }))
    }

    Router::new()
        .route("/sign-in", post(echo))
        .route("/me", get(|| async { "me" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                "late"
            }),
        )
}

/// Production pipeline with the echo auth group and an in-memory access log.
pub fn pipeline() -> (Pipeline, MemorySink) {
    pipeline_with(&AppConfig::default())
}

pub fn pipeline_with(config: &AppConfig) -> (Pipeline, MemorySink) {
    let sink = MemorySink::new();
    let pipeline = build_pipeline(config, echo_auth(), Arc::new(sink.clone())).unwrap();
    (pipeline, sink)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn start_server(config: AppConfig, pipeline: Pipeline) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    let server = HttpServer::new(config, pipeline);
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}
