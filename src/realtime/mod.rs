//! Real-time messaging subsystem.
//!
//! # Data Flow
//! ```text
//! GET <realtime.path> (upgrade, attached to the net::Listener)
//!     → hub.rs (register session, subscriptions, fan-out)
//!     → session.rs (socket loop: inbound frames, outbound queue, close)
//!     → messages.rs (type-tagged JSON frames)
//! ```
//!
//! # Design Decisions
//! - Bounded queue per session; a full queue drops the event for that session
//! - The hub shares the HTTP listener instead of binding its own socket
//! - `close_all` sends a close frame to every session and refuses new upgrades

pub mod hub;
pub mod messages;
mod session;

pub use hub::{RealtimeError, RealtimeHub, SessionId};
pub use messages::{ClientMessage, ServerMessage, BROADCAST_CHANNEL};
