//! Metrics collection and exposition.
//!
//! # Metrics
//! - `app_requests_total` (counter): requests by method, status
//! - `app_request_duration_seconds` (histogram): latency by method
//! - `app_errors_total` (counter): error responses by error code
//! - `app_body_rejected_total` (counter): oversized bodies by check
//! - `app_realtime_connections` (gauge): open real-time sessions
//! - `app_realtime_dropped_total` (counter): messages dropped for slow sessions
//! - `app_task_runs_total` (counter): scheduled task runs by task, outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "app_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("app_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_error(code: &str) {
    counter!("app_errors_total", "code" => code.to_string()).increment(1);
}

pub fn record_body_rejected(check: &'static str) {
    counter!("app_body_rejected_total", "check" => check).increment(1);
}

pub fn set_realtime_connections(count: usize) {
    gauge!("app_realtime_connections").set(count as f64);
}

pub fn record_realtime_dropped(channel: &str) {
    counter!("app_realtime_dropped_total", "channel" => channel.to_string()).increment(1);
}

pub fn record_task_run(task: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("app_task_runs_total", "task" => task, "outcome" => outcome).increment(1);
}
