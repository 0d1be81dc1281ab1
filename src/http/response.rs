//! Canned responses produced by the pipeline itself.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// 404 with an empty body.
pub fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// The single response every unhandled fault turns into.
pub fn internal_server_error() -> Response {
    let body = serde_json::json!({ "error": "Internal Server Error" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Answer for a request that ran past its deadline.
pub fn request_timeout() -> Response {
    let body = serde_json::json!({ "error": "Request Timeout" });
    (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response()
}

/// 204 with an explicit zero length, as browsers expect for CORS preflight.
pub fn no_content() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from_static("0"));
    response
}
