//! HTTP application server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    APP SERVER                        │
//!                      │                                                      │
//!   Client Request     │  ┌──────────┐   ┌──────────────────────────────────┐ │
//!   ───────────────────┼─▶│   net    │──▶│ http pipeline                    │ │
//!                      │  │ listener │   │  errors → security → cors        │ │
//!                      │  └────┬─────┘   │  → compression → json → form     │ │
//!                      │       │         │  → /uploads → /api               │ │
//!   WebSocket upgrade  │       ▼         └──────────────────────────────────┘ │
//!   ───────────────────┼─▶ realtime hub ◀── scheduler (heartbeat, sweeper)    │
//!                      │                                                      │
//!                      │  config · lifecycle · observability · security       │
//!                      └──────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration comes from defaults, the TOML file named by `APP_CONFIG`
//! and environment variables (`PORT`, `HOST`, `UPLOAD_DIR`, `FRONTEND_URL`,
//! `LOG_LEVEL`, `REQUEST_TIMEOUT_SECS`, `METRICS_ADDRESS`).

use app_server::config::load_from_env;
use app_server::lifecycle::spawn_signal_handler;
use app_server::observability::{logging, metrics};
use app_server::Application;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env(|name| std::env::var(name).ok())?;

    logging::init(&config.observability)?;
    tracing::info!("app-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        uploads = %config.uploads.dir.display(),
        frontend_url = config.cors.frontend_url.as_deref().unwrap_or("<none>"),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: std::net::SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let app = Application::new(config).start().await?;
    tracing::info!(address = %app.local_addr(), "Server running");

    spawn_signal_handler(app.shutdown_handle());
    app.wait().await?;

    Ok(())
}
