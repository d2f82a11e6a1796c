//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the pipeline-bearing application router
//! - Merge upgrade routes registered on the listener (outside the pipeline)
//! - Wire ambient layers (request id, tracing, metrics, backpressure)
//! - Serve until the shutdown signal fires, then drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::sync::{oneshot, Semaphore};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::http::pipeline::Pipeline;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, track_requests};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::Listener;
use crate::security::limits::in_flight_limit_middleware;

/// Build the application router: the standard pipeline around `api`.
pub fn build_app(config: &AppConfig, api: Router) -> Router {
    Pipeline::standard().build(config, api)
}

/// Wrap a router with the layers every request passes through, including
/// upgrade requests that bypass the pipeline.
pub fn with_ambient_layers(router: Router, config: &AppConfig) -> Router {
    router
        .layer(middleware::from_fn_with_state(
            Arc::new(Semaphore::new(config.listener.max_in_flight)),
            in_flight_limit_middleware,
        ))
        .layer(middleware::from_fn(track_requests))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// HTTP server for the application.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a new HTTP server around an already-built application router.
    pub fn new(config: Arc<AppConfig>, app: Router) -> Self {
        Self {
            router: app,
            config,
        }
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// `ready` receives the bound address once the accept loop is about to
    /// start. Returns after the shutdown signal fired and every in-flight
    /// request completed.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
        ready: oneshot::Sender<SocketAddr>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let (tcp, upgrades) = listener.into_parts();

        let app = with_ambient_layers(self.router.merge(upgrades), &self.config);
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        tracing::info!(address = %addr, "HTTP server starting");
        let _ = ready.send(addr);

        axum::serve(tcp, service)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
