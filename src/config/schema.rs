//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the application.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::RoutingOptions;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security response headers.
    pub security_headers: SecurityHeadersConfig,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,

    /// Request body decoding.
    pub body: BodyConfig,

    /// Custom security checks.
    pub security: SecurityConfig,

    /// Path matching behaviour.
    pub routing: RoutingOptions,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive (trace, debug, info, warn, error, or a full filter).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security response headers configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    /// Emit security headers at all.
    pub enabled: bool,

    /// `Content-Security-Policy` value.
    pub content_security_policy: String,

    /// `Strict-Transport-Security` max-age in seconds.
    pub hsts_max_age_secs: u64,

    /// Append `includeSubDomains` to HSTS.
    pub hsts_include_subdomains: bool,

    /// `X-Frame-Options` value.
    pub frame_options: String,

    /// `Referrer-Policy` value.
    pub referrer_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: [
                "default-src 'self'",
                "base-uri 'self'",
                "font-src 'self' https: data:",
                "form-action 'self'",
                "frame-ancestors 'self'",
                "img-src 'self' data:",
                "object-src 'none'",
                "script-src 'self'",
                "script-src-attr 'none'",
                "style-src 'self' https: 'unsafe-inline'",
                "upgrade-insecure-requests",
            ]
            .join(";"),
            hsts_max_age_secs: 31_536_000, // 365 days
            hsts_include_subdomains: true,
            frame_options: "SAMEORIGIN".to_string(),
            referrer_policy: "no-referrer".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any.
    pub allowed_origins: Vec<String>,

    /// Methods announced on preflight.
    pub allowed_methods: Vec<String>,

    /// Headers announced on preflight; empty reflects the request's.
    pub allowed_headers: Vec<String>,

    /// Headers exposed to browser scripts.
    pub exposed_headers: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Preflight cache duration in seconds.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}

/// Request body decoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum JSON body size in bytes.
    pub json_limit: usize,

    /// Maximum URL-encoded body size in bytes.
    pub urlencoded_limit: usize,

    /// Maximum number of URL-encoded parameters.
    pub parameter_limit: usize,

    /// Decode bracket syntax (`a[b]=1`) into nested objects.
    pub extended: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            json_limit: 100 * 1024,
            urlencoded_limit: 100 * 1024,
            parameter_limit: 1000,
            extended: true,
        }
    }
}

/// Custom security checks configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Run the security stage at all.
    pub enabled: bool,

    /// Case-insensitive substrings of `User-Agent` that are refused.
    pub blocked_user_agents: Vec<String>,

    /// Longest accepted request target, in bytes.
    pub max_uri_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_user_agents: Vec::new(),
            max_uri_length: 8 * 1024,
        }
    }
}
