//! Access logging.
//!
//! One record per request, in Apache combined format, written when the final
//! response is known. The stage registers no request-side behavior; its
//! response hook fires for every outcome (dispatch, short-circuit, 404, 500).
//!
//! ```text
//! 10.0.0.7 - - [17/Oct/2026:09:15:02 +0000] "GET / HTTP/1.1" 200 17 "-" "curl/8.5.0"
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{header, Request},
    response::Response,
    BoxError,
};
use chrono::Utc;

use crate::observability::metrics;
use crate::pipeline::stage::pass;
use crate::pipeline::{BoxFuture, Exchange, Flow, Stage};

const CLF_DATE: &str = "%d/%b/%Y:%H:%M:%S %z";

/// A finished request, as seen by the access log.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    /// The formatted combined-log line.
    pub line: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency: Duration,
    pub request_id: Option<String>,
    pub outcome: &'static str,
    pub remote_addr: Option<SocketAddr>,
}

/// Destination for access records.
pub trait AccessLogSink: Send + Sync + 'static {
    fn write(&self, record: &AccessRecord);
}

/// Emits records as `tracing` events under the `access` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn write(&self, record: &AccessRecord) {
        tracing::info!(
            target: "access",
            method = %record.method,
            path = %record.path,
            status = record.status,
            latency_ms = record.latency.as_millis() as u64,
            request_id = record.request_id.as_deref().unwrap_or("-"),
            outcome = record.outcome,
            "{}",
            record.line
        );
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AccessRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AccessRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AccessLogSink for MemorySink {
    fn write(&self, record: &AccessRecord) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
    }
}

/// Writes one access record per request.
#[derive(Clone)]
pub struct AccessLogStage {
    sink: Arc<dyn AccessLogSink>,
}

impl AccessLogStage {
    pub fn new(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink }
    }

    fn record(&self, exchange: &Exchange, response: &Response) -> AccessRecord {
        let uri = exchange.uri();
        let url = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
        let status = response.status().as_u16();

        let line = format!(
            "{addr} - - [{date}] \"{method} {url} {version:?}\" {status} {length} \"{referrer}\" \"{agent}\"",
            addr = exchange
                .remote_addr()
                .map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
            date = Utc::now().format(CLF_DATE),
            method = exchange.method(),
            version = exchange.version(),
            length = content_length(response).map_or_else(|| "-".to_string(), |n| n.to_string()),
            referrer = exchange.header_str(header::REFERER.as_str()).unwrap_or("-"),
            agent = exchange.header_str(header::USER_AGENT.as_str()).unwrap_or("-"),
        );

        AccessRecord {
            line,
            method: exchange.method().to_string(),
            path: uri.path().to_string(),
            status,
            latency: exchange.elapsed(),
            request_id: exchange.request_id().map(str::to_string),
            outcome: exchange.outcome().as_str(),
            remote_addr: exchange.remote_addr(),
        }
    }
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

impl Stage for AccessLogStage {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn on_request<'a>(
        &'a self,
        _request: &'a mut Request<Body>,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        pass()
    }

    fn on_response(&self, exchange: &Exchange, response: &mut Response) {
        let record = self.record(exchange, response);
        metrics::record_request(&record.method, record.status, record.outcome, record.latency);
        self.sink.write(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ConnectInfo;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn exchange() -> Exchange {
        let mut req = Request::builder()
            .uri("/api/auth/sign-in?next=%2Fhome")
            .header(header::USER_AGENT, "curl/8.5.0")
            .header(header::REFERER, "https://app.example/")
            .header("x-request-id", "req-1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.7:5555".parse::<SocketAddr>().unwrap()));
        Exchange::from_request(&req)
    }

    #[test]
    fn test_combined_line() {
        let sink = MemorySink::new();
        let stage = AccessLogStage::new(Arc::new(sink.clone()));
        let mut response = (StatusCode::CREATED, "created!").into_response();

        stage.on_response(&exchange(), &mut response);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, 201);
        assert_eq!(record.path, "/api/auth/sign-in");
        assert_eq!(record.request_id.as_deref(), Some("req-1"));
        assert!(record.line.starts_with("10.0.0.7 - - ["));
        assert!(record
            .line
            .ends_with("] \"GET /api/auth/sign-in?next=%2Fhome HTTP/1.1\" 201 8 \"https://app.example/\" \"curl/8.5.0\""));
    }

    #[test]
    fn test_missing_fields_render_as_dash() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let exchange = Exchange::from_request(&req);
        let sink = MemorySink::new();
        let stage = AccessLogStage::new(Arc::new(sink.clone()));

        let mut response = Response::new(Body::from_stream(futures_util::stream::empty::<
            Result<axum::body::Bytes, std::io::Error>,
        >()));
        stage.on_response(&exchange, &mut response);

        let line = &sink.records()[0].line;
        assert!(line.starts_with("- - - ["));
        assert!(line.ends_with("\"GET / HTTP/1.1\" 200 - \"-\" \"-\""));
    }
}
