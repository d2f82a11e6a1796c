//! Built-in tasks.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::json;

use crate::scheduler::task::{ScheduledTask, TaskContext, TaskError};

/// Broadcasts a `heartbeat` event to every real-time session.
pub struct Heartbeat {
    interval: Duration,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl ScheduledTask for Heartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let connections = ctx.realtime.connection_count();
        if connections > 0 {
            ctx.realtime
                .broadcast("heartbeat", json!({ "connections": connections }));
        }
        Ok(())
    }
}

/// Deletes uploaded files older than the retention window.
pub struct UploadSweeper {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl UploadSweeper {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
            interval,
        }
    }
}

#[async_trait]
impl ScheduledTask for UploadSweeper {
    fn name(&self) -> &'static str {
        "upload_sweeper"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run_immediately(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let removed = sweep(&self.dir, self.retention, SystemTime::now()).await?;
        if removed > 0 {
            tracing::info!(dir = %self.dir.display(), removed, "Expired uploads removed");
            ctx.realtime
                .publish("system", "uploads_swept", json!({ "removed": removed }));
        }
        Ok(())
    }
}

/// Remove regular files under `dir` last modified more than `retention`
/// before `now`. Directories are kept. A missing `dir` sweeps nothing.
pub async fn sweep(dir: &Path, retention: Duration, now: SystemTime) -> std::io::Result<usize> {
    let cutoff = match now.checked_sub(retention) {
        Some(cutoff) => cutoff,
        None => return Ok(0),
    };

    let mut removed = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(removed)
}
