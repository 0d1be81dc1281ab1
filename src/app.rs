//! Production composition of the request pipeline.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, Router};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::stages::{
    AccessLogSink, AccessLogStage, BodyStage, CookieStage, CorsStage, HeaderConfigError,
    SecurityHeadersStage, SecurityStage,
};

/// Body served by `GET /`.
pub const GREETING: &str = "Hello From Bhavin";

/// Where the authentication route group is mounted.
pub const AUTH_PREFIX: &str = "/api/auth";

/// `GET /`: a fixed plain-text greeting.
pub async fn greeting(_request: Request<Body>) -> Result<&'static str, Infallible> {
    tracing::info!("Hello From Bhavin!");
    Ok(GREETING)
}

/// Build the application pipeline.
///
/// Stage order is fixed: security headers, CORS, body, cookies, access log,
/// security checks. `auth` is mounted at [`AUTH_PREFIX`]. Requests running
/// past `timeouts.request_secs` are answered with `408`.
pub fn build_pipeline(
    config: &AppConfig,
    auth: Router,
    sink: Arc<dyn AccessLogSink>,
) -> Result<Pipeline, HeaderConfigError> {
    let pipeline = Pipeline::builder()
        .routing(config.routing)
        .timeout(Duration::from_secs(config.timeouts.request_secs))
        .stage(SecurityHeadersStage::new(&config.security_headers)?)
        .stage(CorsStage::new(&config.cors)?)
        .stage(BodyStage::new(&config.body))
        .stage(CookieStage::new())
        .stage(AccessLogStage::new(sink))
        .stage(SecurityStage::from_config(&config.security))
        .get("/", greeting)
        .mount(AUTH_PREFIX, auth)
        .build();
    Ok(pipeline)
}
