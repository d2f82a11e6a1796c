//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build router → Bind listener → Attach real-time hub
//!     → Start accepting → Task setup
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Close sessions → Drain (bounded) → Stop tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: traffic only once the hub is attached
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: connections still open after the grace period are dropped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::spawn_signal_handler;
pub use startup::{Application, RunningApp, StartupError};
