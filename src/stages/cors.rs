//! CORS (Cross-Origin Resource Sharing) stage.
//!
//! ## Preflight Requests
//!
//! Every `OPTIONS` request is treated as a preflight and answered here with
//! `204 No Content`; nothing after this stage runs for it.
//!
//! ## Regular Requests
//!
//! The final response gains:
//! - `Access-Control-Allow-Origin` (`*`, or the request origin if listed)
//! - `Access-Control-Allow-Credentials` if configured
//! - `Access-Control-Expose-Headers` if configured

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request},
    response::Response,
    BoxError,
};

use crate::config::CorsConfig;
use crate::http::response;
use crate::pipeline::{BoxFuture, Exchange, Flow, Stage};
use crate::stages::{header_value, HeaderConfigError};

/// Represents the set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Allow any origin (wildcard `*`).
    Any,
    /// Allow specific origins.
    List(Vec<String>),
}

impl AllowedOrigins {
    fn from_config(origins: &[String]) -> Self {
        if origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins.to_vec())
        }
    }

    /// The `Access-Control-Allow-Origin` value for a request origin, if any.
    fn header_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        match self {
            AllowedOrigins::Any => Some(HeaderValue::from_static("*")),
            AllowedOrigins::List(origins) => {
                let origin = origin?;
                if origins.iter().any(|o| o == origin) {
                    HeaderValue::from_str(origin).ok()
                } else {
                    None
                }
            }
        }
    }

    fn varies(&self) -> bool {
        matches!(self, AllowedOrigins::List(_))
    }
}

/// Answers preflights and decorates responses with CORS headers.
#[derive(Debug, Clone)]
pub struct CorsStage {
    origins: AllowedOrigins,
    methods: HeaderValue,
    allowed_headers: Option<HeaderValue>,
    exposed_headers: Option<HeaderValue>,
    credentials: bool,
    max_age: Option<HeaderValue>,
}

impl CorsStage {
    pub fn new(config: &CorsConfig) -> Result<Self, HeaderConfigError> {
        let join = |field, values: &[String]| -> Result<Option<HeaderValue>, HeaderConfigError> {
            if values.is_empty() {
                Ok(None)
            } else {
                header_value(field, &values.join(",")).map(Some)
            }
        };

        Ok(Self {
            origins: AllowedOrigins::from_config(&config.allowed_origins),
            methods: header_value("cors.allowed_methods", &config.allowed_methods.join(","))?,
            allowed_headers: join("cors.allowed_headers", &config.allowed_headers)?,
            exposed_headers: join("cors.exposed_headers", &config.exposed_headers)?,
            credentials: config.allow_credentials,
            max_age: config.max_age_secs.map(HeaderValue::from),
        })
    }

    fn apply_origin(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        if self.origins.varies() {
            append_vary(headers, "Origin");
        }
        if let Some(value) = self.origins.header_value(origin) {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .or_insert(value);
        }
        if self.credentials {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .or_insert(HeaderValue::from_static("true"));
        }
    }

    fn preflight(&self, request: &Request<Body>) -> Response {
        let mut response = response::no_content();
        let origin = request
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok());
        let headers = response.headers_mut();

        self.apply_origin(origin, headers);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone());

        match &self.allowed_headers {
            Some(allowed) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
            }
            None => {
                append_vary(headers, "Access-Control-Request-Headers");
                if let Some(requested) = request.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
                }
            }
        }

        if let Some(max_age) = &self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        if let Some(exposed) = &self.exposed_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, exposed.clone());
        }

        response
    }
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        let flow = if request.method() == Method::OPTIONS {
            Flow::Respond(self.preflight(request))
        } else {
            Flow::Continue
        };
        Box::pin(std::future::ready(Ok(flow)))
    }

    fn on_response(&self, exchange: &Exchange, response: &mut Response) {
        // Preflight responses are complete already.
        if exchange.method() == Method::OPTIONS {
            return;
        }
        let headers = response.headers_mut();
        self.apply_origin(exchange.header_str(header::ORIGIN.as_str()), headers);
        if let Some(exposed) = &self.exposed_headers {
            headers
                .entry(header::ACCESS_CONTROL_EXPOSE_HEADERS)
                .or_insert(exposed.clone());
        }
    }
}

/// Add `field` to `Vary` unless it is already covered.
fn append_vary(headers: &mut HeaderMap, field: &'static str) {
    let covered = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|v| v == "*" || v.eq_ignore_ascii_case(field));
    if !covered {
        headers.append(header::VARY, HeaderValue::from_static(field));
    }
}
