//! Request pipeline composition.
//!
//! # Data Flow
//! ```text
//! Request<Body> (from transport)
//!     → Exchange::from_request (snapshot method, uri, headers, peer)
//!     → stage 1 .. stage N on_request   (Continue | Respond | Err)
//!     → RouteTable::dispatch            (endpoint | mounted group | 404)
//!     → fault conversion (Err / panic → 500, exactly once)
//!     → stage N .. stage 1 on_response  (headers, access log)
//!     → Response (returned by value to transport)
//! ```
//!
//! # Design Decisions
//! - Stages run in registration order; there is no priority system
//! - Every stage's response hook runs for every request, whatever branch was taken
//! - Per-request data lives in the Request/Exchange pair; stages hold no mutable state
//! - The composer is the only place an error becomes a 500

pub mod composer;
pub mod error;
pub mod exchange;
pub mod stage;

pub use composer::{Pipeline, PipelineBuilder};
pub use error::{PipelineError, Rejection};
pub use exchange::{Exchange, Outcome};
pub use stage::{BoxFuture, Flow, FnStage, Stage};
