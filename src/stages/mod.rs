//! Concrete pipeline stages.
//!
//! Production order (see `app::build_pipeline`):
//!
//! 1. `security_headers` - hardening headers on every response
//! 2. `cors` - preflight answers and cross-origin response headers
//! 3. `body` - JSON and URL-encoded body decoding
//! 4. `cookies` - `Cookie` header decoding
//! 5. `access_log` - one access line per request, written on completion
//! 6. `security` - custom request checks

pub mod access_log;
pub mod body;
pub mod cookies;
pub mod cors;
pub mod security;
pub mod security_headers;

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

pub use access_log::{AccessLogSink, AccessLogStage, AccessRecord, MemorySink, TracingSink};
pub use body::{BodyStage, ParsedBody};
pub use cookies::{CookieStage, Cookies};
pub use cors::CorsStage;
pub use security::{MaxUriLength, SecurityRule, SecurityStage, UserAgentDenylist};
pub use security_headers::SecurityHeadersStage;

/// A configured value could not be turned into a header.
#[derive(Debug, Error)]
#[error("invalid header value for `{field}`: {source}")]
pub struct HeaderConfigError {
    pub field: &'static str,
    #[source]
    pub source: InvalidHeaderValue,
}

pub(crate) fn header_value(
    field: &'static str,
    value: &str,
) -> Result<axum::http::HeaderValue, HeaderConfigError> {
    axum::http::HeaderValue::from_str(value).map_err(|source| HeaderConfigError { field, source })
}
