//! HTTP application server library.
//!
//! A single bootstrap that assembles the request pipeline, mounts uploads
//! and the API route tree, attaches the real-time hub to the listener and
//! starts periodic tasks once traffic flows.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod realtime;
pub mod scheduler;
pub mod security;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::{Application, RunningApp, Shutdown, StartupError};
pub use realtime::RealtimeHub;
