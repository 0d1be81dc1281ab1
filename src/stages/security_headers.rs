//! Security response headers.
//!
//! Every response leaving the pipeline carries the hardening headers below,
//! including short-circuit, 404 and 500 responses. A handler that sets one of
//! them itself keeps its own value.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    response::Response,
    BoxError,
};

use crate::config::SecurityHeadersConfig;
use crate::pipeline::stage::pass;
use crate::pipeline::{BoxFuture, Exchange, Flow, Stage};
use crate::stages::{header_value, HeaderConfigError};

static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Adds hardening headers to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeadersStage {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeadersStage {
    pub fn new(config: &SecurityHeadersConfig) -> Result<Self, HeaderConfigError> {
        if !config.enabled {
            return Ok(Self { headers: Vec::new() });
        }

        let mut hsts = format!("max-age={}", config.hsts_max_age_secs);
        if config.hsts_include_subdomains {
            hsts.push_str("; includeSubDomains");
        }

        let headers = vec![
            (
                HeaderName::from_static("content-security-policy"),
                header_value("content_security_policy", &config.content_security_policy)?,
            ),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("origin-agent-cluster"),
                HeaderValue::from_static("?1"),
            ),
            (
                HeaderName::from_static("referrer-policy"),
                header_value("referrer_policy", &config.referrer_policy)?,
            ),
            (
                HeaderName::from_static("strict-transport-security"),
                header_value("hsts", &hsts)?,
            ),
            (
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ),
            (
                HeaderName::from_static("x-dns-prefetch-control"),
                HeaderValue::from_static("off"),
            ),
            (
                HeaderName::from_static("x-download-options"),
                HeaderValue::from_static("noopen"),
            ),
            (
                HeaderName::from_static("x-frame-options"),
                header_value("frame_options", &config.frame_options)?,
            ),
            (
                HeaderName::from_static("x-permitted-cross-domain-policies"),
                HeaderValue::from_static("none"),
            ),
            (
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("0"),
            ),
        ];

        Ok(Self { headers })
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }
}

impl Stage for SecurityHeadersStage {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn on_request<'a>(
        &'a self,
        _request: &'a mut Request<Body>,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        pass()
    }

    fn on_response(&self, _exchange: &Exchange, response: &mut Response) {
        let headers = response.headers_mut();
        headers.remove(&X_POWERED_BY);
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}
