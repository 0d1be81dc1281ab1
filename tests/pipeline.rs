//! End-to-end tests of the composed pipeline, driven in-process.

use std::sync::Arc;

use app_pipeline::app::GREETING;
use app_pipeline::config::AppConfig;
use app_pipeline::pipeline::{FnStage, Flow, Pipeline};
use app_pipeline::stages::{AccessLogStage, MemorySink, SecurityHeadersStage};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

mod common;

use common::{body_string, get_request};

fn assert_security_headers(response: &axum::response::Response) {
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert!(headers.get("content-security-policy").is_some());
}

#[tokio::test]
async fn test_greeting() {
    let (pipeline, sink) = common::pipeline();

    let response = pipeline.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_security_headers(&response);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_string(response).await, GREETING);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 200);
    assert_eq!(records[0].outcome, "dispatched");
}

#[tokio::test]
async fn test_greeting_is_stable_across_requests() {
    let (pipeline, sink) = common::pipeline();
    for _ in 0..5 {
        let response = pipeline.handle(get_request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, GREETING);
    }
    assert_eq!(sink.records().len(), 5);
}

#[tokio::test]
async fn test_head_on_greeting() {
    let (pipeline, _) = common::pipeline();
    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (pipeline, sink) = common::pipeline();

    let response = pipeline.handle(get_request("/unknown-path")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_security_headers(&response);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "not_found");
}

#[tokio::test]
async fn test_prefix_lookalike_is_not_auth() {
    let (pipeline, _) = common::pipeline();
    let response = pipeline.handle(get_request("/api/authx/me")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auth_group_sees_shared_stage_output() {
    let (pipeline, sink) = common::pipeline();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "session=abc%20123; theme=dark")
        .body(Body::from(r#"{"email":"a@example.com"}"#))
        .unwrap();

    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_security_headers(&response);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["body"]["email"], "a@example.com");
    assert_eq!(body["session"], "abc 123");
    assert_eq!(body["raw_len"], 25);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/api/auth/sign-in");
}

#[tokio::test]
async fn test_auth_group_unknown_route_is_its_own_404() {
    let (pipeline, sink) = common::pipeline();
    let response = pipeline.handle(get_request("/api/auth/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_security_headers(&response);
    assert_eq!(sink.records()[0].outcome, "dispatched");
}

#[tokio::test]
async fn test_preflight_short_circuits_but_is_logged() {
    let (pipeline, sink) = common::pipeline();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/sign-in")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_security_headers(&response);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 204);
    assert_eq!(records[0].outcome, "short_circuited");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (pipeline, sink) = common::pipeline();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(sink.records()[0].status, 400);
}

#[tokio::test]
async fn test_blocked_user_agent_is_403() {
    let mut config = AppConfig::default();
    config.security.blocked_user_agents = vec!["sqlmap".to_string()];
    let (pipeline, sink) = common::pipeline_with(&config);

    let request = Request::builder()
        .uri("/")
        .header(header::USER_AGENT, "sqlmap/1.7")
        .body(Body::empty())
        .unwrap();
    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_security_headers(&response);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn test_faulting_stages_become_one_500() {
    for panics in [false, true] {
        let sink = MemorySink::new();
        let pipeline = Pipeline::builder()
            .stage(SecurityHeadersStage::new(&Default::default()).unwrap())
            .stage(AccessLogStage::new(Arc::new(sink.clone())))
            .stage(FnStage::new("faulty", move |_req, _ex| {
                if panics {
                    panic!("stage exploded");
                }
                Err::<Flow, _>("stage failed".into())
            }))
            .get("/", |_| async { Ok::<_, std::convert::Infallible>("unreachable") })
            .build();

        let response = pipeline.handle(get_request("/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_security_headers(&response);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].is_string());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, "faulted");
    }
}

#[tokio::test]
async fn test_concurrent_requests_do_not_share_state() {
    let (pipeline, sink) = common::pipeline();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/auth/sign-in")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::COOKIE, format!("session=s{i}"))
                .body(Body::from(format!("user[id]={i}")))
                .unwrap();
            let response = pipeline.handle(request).await;
            let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
            (i, body)
        }));
    }

    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body["session"], format!("s{i}"));
        assert_eq!(body["body"]["user"]["id"], i.to_string());
    }
    assert_eq!(sink.records().len(), 32);
}

#[tokio::test]
async fn test_timed_out_request_is_hardened_and_logged() {
    let mut config = AppConfig::default();
    config.timeouts.request_secs = 1;
    let (pipeline, sink) = common::pipeline_with(&config);

    let response = pipeline.handle(get_request("/api/auth/slow")).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_security_headers(&response);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 408);
    assert_eq!(records[0].outcome, "timed_out");
}

#[tokio::test]
async fn test_gzip_form_reaches_auth_group() {
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    let form = "user[name]=Bhavin&user[roles][]=admin&user[roles][]=dev";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(form.as_bytes()).unwrap();

    let (pipeline, _sink) = common::pipeline();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(encoder.finish().unwrap()))
        .unwrap();

    let response = pipeline.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["body"]["user"]["name"], "Bhavin");
    assert_eq!(body["body"]["user"]["roles"], serde_json::json!(["admin", "dev"]));
    assert_eq!(body["raw_len"], form.len());
}
