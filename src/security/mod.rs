//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (defensive response headers, outermost stage)
//!     → cors.rs (single allowed origin, credentials for it only)
//!     → limits.rs (body ceilings used by the parsing stages)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: an invalid frontend origin allows no origin at all
//! - Body limits are checked on the declared length and again while reading

pub mod cors;
pub mod headers;
pub mod limits;

pub use cors::cors_layer;
pub use headers::{security_headers_middleware, SecurityHeaders};
