//! HTTP transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, connect info, graceful shutdown)
//!     → TraceLayer → request ID layers
//!     → Pipeline (as the router's fallback service)
//!     → Send response to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id_layers, UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
