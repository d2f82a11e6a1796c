//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by observability.log_level)
//!     → Prometheus scrape endpoint (when observability.metrics_enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace span
//! - Metrics calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
