//! The raw network listener shared by HTTP and upgrade handlers.
//!
//! # Responsibilities
//! - Bind the configured address (exactly once per process and port)
//! - Collect upgrade routes from subsystems before serving starts
//! - Hand the socket and the upgrade routes to the HTTP server
//!
//! Serving consumes the listener, so upgrade hooks can only be attached
//! before the first connection is accepted.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Another subsystem already owns this upgrade path.
    #[error("Upgrade path {0} is already registered")]
    UpgradeConflict(String),
}

/// A bound TCP listener plus the upgrade routes attached to it.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Routes that bypass the HTTP pipeline (connection upgrades).
    upgrades: Router,
    /// Paths registered in `upgrades`.
    upgrade_paths: Vec<String>,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = config.bind_address();
        let bind_error = |source| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let addr: SocketAddr = address.parse().map_err(|e| {
            bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            upgrades: Router::new(),
            upgrade_paths: Vec::new(),
        })
    }

    /// Attach an upgrade route. `router` must only serve `path`.
    pub fn attach_upgrade(&mut self, path: &str, router: Router) -> Result<(), ListenerError> {
        if self.upgrade_paths.iter().any(|p| p == path) {
            return Err(ListenerError::UpgradeConflict(path.to_string()));
        }

        self.upgrades = std::mem::take(&mut self.upgrades).merge(router);
        self.upgrade_paths.push(path.to_string());

        tracing::debug!(path, "Upgrade handler attached");
        Ok(())
    }

    /// Paths with an attached upgrade handler.
    pub fn upgrade_paths(&self) -> &[String] {
        &self.upgrade_paths
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub(crate) fn into_parts(self) -> (TcpListener, Router) {
        (self.inner, self.upgrades)
    }
}
