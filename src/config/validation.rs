//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Detect contradictory CORS settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderValue, Method};
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("cors.allow_credentials cannot be combined with a wildcard origin")]
    CredentialsWithWildcard,

    #[error("cors.allowed_methods contains invalid method `{0}`")]
    CorsMethod(String),

    #[error("`{field}` is not a valid header value")]
    HeaderValue { field: &'static str },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs as usize),
        ("body.json_limit", config.body.json_limit),
        ("body.urlencoded_limit", config.body.urlencoded_limit),
        ("body.parameter_limit", config.body.parameter_limit),
        ("security.max_uri_length", config.security.max_uri_length),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let cors = &config.cors;
    if cors.allow_credentials && cors.allowed_origins.iter().any(|o| o == "*") {
        errors.push(ValidationError::CredentialsWithWildcard);
    }
    for method in &cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::CorsMethod(method.clone()));
        }
    }

    let headers = &config.security_headers;
    let header_fields = [
        ("security_headers.content_security_policy", &headers.content_security_policy),
        ("security_headers.frame_options", &headers.frame_options),
        ("security_headers.referrer_policy", &headers.referrer_policy),
    ];
    for (field, value) in header_fields {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::HeaderValue { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
