//! Per-request context shared by the stages of one pipeline run.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap, Method, Request, Uri, Version},
};

use crate::http::request::X_REQUEST_ID;

/// How the pipeline arrived at the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Still running.
    Pending,
    /// A route (endpoint or mounted group) produced the response.
    Dispatched,
    /// A stage answered before dispatch.
    ShortCircuited { stage: &'static str },
    /// No route matched.
    NotFound,
    /// A fault was converted into a 500.
    Faulted,
    /// The request deadline passed before a response was produced.
    TimedOut,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Dispatched => "dispatched",
            Outcome::ShortCircuited { .. } => "short_circuited",
            Outcome::NotFound => "not_found",
            Outcome::Faulted => "faulted",
            Outcome::TimedOut => "timed_out",
        }
    }
}

/// Snapshot of the inbound request plus stage-private state.
///
/// Created before the first stage runs, so response hooks can rely on it
/// even when the request itself has been moved into a handler.
#[derive(Debug)]
pub struct Exchange {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    request_id: Option<String>,
    started_at: Instant,
    outcome: Outcome,
    extensions: Extensions,
}

impl Exchange {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let request_id = request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
            remote_addr,
            request_id,
            started_at: Instant::now(),
            outcome: Outcome::Pending,
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI as received, before any mount stripped a prefix.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_snapshot_captures_request_metadata() {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/sign-in?next=%2F")
            .header("x-request-id", "abc-123")
            .header("user-agent", "test-agent")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));

        let exchange = Exchange::from_request(&req);
        assert_eq!(exchange.method(), Method::POST);
        assert_eq!(exchange.uri().path(), "/api/auth/sign-in");
        assert_eq!(exchange.request_id(), Some("abc-123"));
        assert_eq!(exchange.header_str("user-agent"), Some("test-agent"));
        assert_eq!(exchange.remote_addr(), Some(peer));
        assert_eq!(exchange.outcome(), Outcome::Pending);
    }

    #[test]
    fn test_missing_peer_and_request_id() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let exchange = Exchange::from_request(&req);
        assert!(exchange.remote_addr().is_none());
        assert!(exchange.request_id().is_none());
    }
}
