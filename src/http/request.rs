//! Request identification.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID when the client sent none
//! - Propagate the ID back on the response
//! - Make the ID available to stages via the `Exchange`
//!
//! # Design Decisions
//! - Request ID added by the transport, before the pipeline runs
//! - A client-supplied `x-request-id` is kept as-is

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

/// The header carrying the request ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// UUID v4 generator for tower-http's request ID middleware.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).ok()?))
    }
}

/// Layers that set (if missing) and propagate `x-request-id`.
pub fn request_id_layers() -> (SetRequestIdLayer<UuidRequestId>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestId),
        PropagateRequestIdLayer::new(X_REQUEST_ID.clone()),
    )
}
