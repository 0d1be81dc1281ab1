//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, path) after all stages ran
//!     → router.rs (scan routes in registration order)
//!     → matcher.rs (method / exact path / mount prefix)
//!     → Endpoint handler, mounted Router, or no match (404 from the composer)
//!
//! Route registration (at startup):
//!     PipelineBuilder::get / route / mount
//!     → RouteTable (frozen inside the Pipeline)
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order, no priorities)

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, RoutingOptions};
pub use router::{handler, Handler, Route, RouteTable};
