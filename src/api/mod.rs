//! Default route tree mounted under `/api`.
//!
//! Embedders replace it with their own router via
//! `Application::with_routes`.

pub mod handlers;

use std::time::Instant;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::realtime::RealtimeHub;

pub fn router(hub: RealtimeHub) -> Router {
    let state = ApiState {
        hub,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/health", get(get_health))
        .route("/realtime/stats", get(get_realtime_stats))
        .with_state(state)
}
