//! The scheduled task abstraction.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::realtime::RealtimeHub;

/// Everything a task may touch. Handed over once the server is accepting.
#[derive(Clone)]
pub struct TaskContext {
    pub config: Arc<AppConfig>,
    pub realtime: RealtimeHub,
    pub shutdown: Shutdown,
    /// Address the server is accepting on.
    pub local_addr: SocketAddr,
}

/// Error type for a single task run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

/// A unit of periodic work.
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Time between runs. Must be non-zero.
    fn interval(&self) -> Duration;

    /// Run once right away instead of waiting a full interval first.
    fn run_immediately(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}
