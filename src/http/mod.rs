//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (ambient layers: request id, trace span, metrics, in-flight cap)
//!     → pipeline.rs (ordered stages)
//!         ErrorHandler → SecurityHeaders → Cors → Compression
//!         → JsonBody → FormBody → Static (/uploads) → Api (/api)
//!     → Send to client
//! ```

pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod server;

pub use pipeline::{Pipeline, PipelineError, Stage};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_app, HttpServer};
