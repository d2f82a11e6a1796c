//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the application router (pipeline + route tree)
//! - Bind the listener, attach the real-time hub, start accepting
//! - Hand periodic work to the task setup once traffic flows
//! - Tear everything down in reverse on shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Steps run strictly in order, never concurrently
//! - A bind failure stops startup before real-time init and task setup

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api;
use crate::config::validation::validate_config;
use crate::config::{AppConfig, ConfigError};
use crate::http::server::{build_app, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::realtime::{RealtimeError, RealtimeHub};
use crate::scheduler::{Scheduler, SchedulerError, SchedulerHandle, TaskContext, TaskSetup};

/// Error type for startup and for the serving phase that follows it.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bind(ListenerError),
    #[error("real-time initialization failed: {0}")]
    Realtime(#[from] RealtimeError),
    #[error("task setup failed: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// A configured, not yet started application.
pub struct Application {
    config: Arc<AppConfig>,
    routes: Option<Router>,
    tasks: Option<Box<dyn TaskSetup>>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            routes: None,
            tasks: None,
        }
    }

    /// Mount `routes` under `/api` instead of the default route tree.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Use `tasks` instead of the scheduler built from configuration.
    pub fn with_tasks(mut self, tasks: impl TaskSetup + 'static) -> Self {
        self.tasks = Some(Box::new(tasks));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the startup sequence. Returns once the server accepts
    /// connections and task setup completed.
    pub async fn start(self) -> Result<RunningApp, StartupError> {
        let Self {
            config,
            routes,
            tasks,
        } = self;

        validate_config(&config).map_err(ConfigError::Validation)?;

        let hub = RealtimeHub::new(&config.realtime);
        let api = routes.unwrap_or_else(|| api::router(hub.clone()));
        let app = build_app(&config, api);

        let mut listener = Listener::bind(&config.listener)
            .await
            .map_err(StartupError::Bind)?;

        hub.initialize(&mut listener)?;

        let shutdown = Shutdown::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = HttpServer::new(Arc::clone(&config), app);
        let server_task = tokio::spawn(server.run(listener, shutdown.subscribe(), ready_tx));

        let local_addr = match ready_rx.await {
            Ok(addr) => addr,
            Err(_) => {
                server_result(server_task.await)?;
                return Err(StartupError::Serve(std::io::Error::other(
                    "server stopped before accepting",
                )));
            }
        };

        let tasks: Box<dyn TaskSetup> = match tasks {
            Some(tasks) => tasks,
            None => Box::new(Scheduler::from_config(&config)),
        };
        let ctx = TaskContext {
            config: Arc::clone(&config),
            realtime: hub.clone(),
            shutdown: shutdown.clone(),
            local_addr,
        };
        let scheduler = match tasks.setup(ctx) {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                hub.close_all();
                let _ = server_task.await;
                return Err(e.into());
            }
        };

        tracing::info!(
            address = %local_addr,
            tasks = scheduler.len(),
            realtime = config.realtime.enabled,
            "Application started"
        );

        Ok(RunningApp {
            local_addr,
            hub,
            shutdown,
            server: server_task,
            scheduler,
            grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        })
    }
}

/// Handle to a started application.
pub struct RunningApp {
    local_addr: SocketAddr,
    hub: RealtimeHub,
    shutdown: Shutdown,
    server: JoinHandle<std::io::Result<()>>,
    scheduler: SchedulerHandle,
    grace: Duration,
}

impl RunningApp {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// A handle that triggers shutdown from anywhere, e.g. a signal task.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serve until shutdown is triggered or the server fails, then stop
    /// every subsystem.
    pub async fn wait(self) -> Result<(), StartupError> {
        let Self {
            hub,
            shutdown,
            mut server,
            scheduler,
            grace,
            ..
        } = self;

        let mut signal = shutdown.subscribe();
        let finished = tokio::select! {
            () = signal.recv() => None,
            result = &mut server => Some(result),
        };

        shutdown.trigger();
        hub.close_all();

        let result = match finished {
            Some(result) => result,
            None => match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    // Aborting the serve task stops the wait only; connections it already
                    // spawned run on until their requests finish or time out.
                    tracing::warn!(
                        grace = ?grace,
                        "Drain deadline passed, no longer waiting for in-flight requests"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            },
        };

        scheduler.join().await;
        tracing::info!("Shutdown complete");
        server_result(result)
    }

    /// Trigger graceful shutdown and wait for it to complete.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        self.wait().await
    }
}

fn server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), StartupError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StartupError::Serve(e)),
        Err(e) => Err(StartupError::Serve(std::io::Error::other(e))),
    }
}
