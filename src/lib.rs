//! HTTP application pipeline.
//!
//! Every inbound request runs through a fixed chain of stages (security
//! headers, CORS, body decoding, cookie decoding, access logging, security
//! checks) before it is dispatched to the greeting endpoint or the mounted
//! authentication route group.

pub mod app;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod stages;

pub use app::build_pipeline;
pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, PipelineBuilder};
