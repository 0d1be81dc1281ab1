//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, PORT / LOG_LEVEL overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → read once at startup to build the pipeline and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pipeline is fixed at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, BodyConfig, CorsConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    SecurityConfig, SecurityHeadersConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
