//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use app_server::config::AppConfig;
use app_server::scheduler::{SchedulerError, SchedulerHandle, TaskContext, TaskSetup};
use app_server::{Application, RunningApp};

pub const FRONTEND: &str = "http://localhost:5173";

/// A uniquely named directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let file = self.path.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file, contents).unwrap();
        file
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Loopback config on an ephemeral port, serving `uploads`.
pub fn test_config(uploads: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.uploads.dir = uploads.to_path_buf();
    config.cors.frontend_url = Some(FRONTEND.into());
    config.scheduler.enabled = false;
    config.timeouts.shutdown_grace_secs = 5;
    config
}

pub async fn start(config: AppConfig) -> RunningApp {
    Application::new(config)
        .start()
        .await
        .expect("application should start")
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

/// Bytes that look like a PNG and cover every byte value.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend((0..=255u8).cycle().take(4096));
    bytes
}

/// Task setup double that records calls and checks the listener is live.
#[derive(Clone, Default)]
pub struct RecordingTasks {
    pub calls: Arc<AtomicUsize>,
    pub reached_listener: Arc<AtomicUsize>,
}

impl RecordingTasks {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reached_listener(&self) -> bool {
        self.reached_listener.load(Ordering::SeqCst) > 0
    }
}

impl TaskSetup for RecordingTasks {
    fn setup(&self, ctx: TaskContext) -> Result<SchedulerHandle, SchedulerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if std::net::TcpStream::connect(ctx.local_addr).is_ok() {
            self.reached_listener.fetch_add(1, Ordering::SeqCst);
        }
        Ok(SchedulerHandle::default())
    }
}
