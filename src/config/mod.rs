//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file named by APP_CONFIG (loader.rs)
//!     → environment overlay: PORT, UPLOAD_DIR, FRONTEND_URL, ... (env.rs)
//!     → validation.rs (semantic checks, all errors reported)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc with every subsystem
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AppConfig, CorsConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, RealtimeConfig,
    SchedulerConfig, SecurityConfig, TimeoutConfig, UploadsConfig,
};
