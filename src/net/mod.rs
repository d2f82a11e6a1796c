//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs  bind address → Listener (not yet serving)
//!     → realtime hub attaches its upgrade route
//!     → http server consumes the Listener and starts accepting
//! ```
//!
//! # Design Decisions
//! - One listener per process; the real-time hub never binds its own socket
//! - Upgrade routes live next to the socket, outside the HTTP pipeline

pub mod listener;

pub use listener::{Listener, ListenerError};
