use std::collections::BTreeMap;
use std::time::Instant;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::realtime::RealtimeHub;

#[derive(Clone)]
pub struct ApiState {
    pub hub: RealtimeHub,
    pub started_at: Instant,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct RealtimeStats {
    pub connections: usize,
    pub channels: BTreeMap<String, usize>,
}

pub async fn get_health(State(state): State<ApiState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_realtime_stats(State(state): State<ApiState>) -> Json<RealtimeStats> {
    Json(RealtimeStats {
        connections: state.hub.connection_count(),
        channels: state.hub.channel_counts(),
    })
}
