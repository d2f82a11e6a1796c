//! Interval scheduler.
//!
//! # Responsibilities
//! - Spawn one Tokio task per registered [`ScheduledTask`]
//! - Tick on a fixed interval, skipping missed ticks
//! - Keep going after a failing run; stop on shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::AppConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::scheduler::task::{ScheduledTask, TaskContext};
use crate::scheduler::tasks::{Heartbeat, UploadSweeper};

/// Error type for scheduler setup.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,
    #[error("task {name}: {reason}")]
    InvalidTask { name: &'static str, reason: String },
}

/// Sets up periodic work once the server is accepting connections.
pub trait TaskSetup: Send + Sync {
    fn setup(&self, ctx: TaskContext) -> Result<SchedulerHandle, SchedulerError>;
}

/// Handle to the spawned task loops.
#[derive(Default)]
pub struct SchedulerHandle {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Wait for every task loop to exit.
    pub async fn join(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(task = name, "Scheduled task panicked");
                }
            }
        }
    }
}

/// The built-in [`TaskSetup`]: runs a fixed list of tasks.
pub struct Scheduler {
    tasks: Vec<Arc<dyn ScheduledTask>>,
    started: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_task(mut self, task: impl ScheduledTask) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    /// The built-in tasks enabled by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut scheduler = Self::new();
        let settings = &config.scheduler;
        if !settings.enabled {
            return scheduler;
        }

        if settings.heartbeat_secs > 0 && config.realtime.enabled {
            scheduler = scheduler.with_task(Heartbeat::new(Duration::from_secs(
                settings.heartbeat_secs,
            )));
        }
        if settings.upload_retention_secs > 0 {
            scheduler = scheduler.with_task(UploadSweeper::new(
                config.uploads.dir.clone(),
                Duration::from_secs(settings.upload_retention_secs),
                Duration::from_secs(settings.sweep_interval_secs),
            ));
        }
        scheduler
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSetup for Scheduler {
    fn setup(&self, ctx: TaskContext) -> Result<SchedulerHandle, SchedulerError> {
        if let Some(task) = self.tasks.iter().find(|task| task.interval().is_zero()) {
            return Err(SchedulerError::InvalidTask {
                name: task.name(),
                reason: "interval must be greater than zero".to_string(),
            });
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let mut handle = SchedulerHandle::default();
        for task in &self.tasks {
            let name = task.name();
            tracing::info!(task = name, interval = ?task.interval(), "Scheduling task");
            let join = tokio::spawn(run_task(
                Arc::clone(task),
                ctx.clone(),
                ctx.shutdown.subscribe(),
            ));
            handle.tasks.push((name, join));
        }

        if handle.is_empty() {
            tracing::info!("No scheduled tasks configured");
        }
        Ok(handle)
    }
}

async fn run_task(task: Arc<dyn ScheduledTask>, ctx: TaskContext, mut shutdown: ShutdownSignal) {
    let period = task.interval();
    let first = if task.run_immediately() {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown.recv() => break,
        }

        tokio::select! {
            outcome = task.run(&ctx) => match outcome {
                Ok(()) => metrics::record_task_run(task.name(), true),
                Err(e) => {
                    metrics::record_task_run(task.name(), false);
                    tracing::warn!(task = task.name(), error = %e, "Scheduled task failed");
                }
            },
            () = shutdown.recv() => break,
        }
    }

    tracing::debug!(task = task.name(), "Scheduled task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealtimeConfig;
    use crate::lifecycle::shutdown::Shutdown;
    use crate::realtime::RealtimeHub;
    use crate::scheduler::task::TaskError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledTask for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        fn run_immediately(&self) -> bool {
            true
        }

        async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TaskError::Failed("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn context(shutdown: Shutdown) -> TaskContext {
        TaskContext {
            config: Arc::new(AppConfig::default()),
            realtime: RealtimeHub::new(&RealtimeConfig::default()),
            shutdown,
            local_addr: "127.0.0.1:0".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn failing_task_keeps_running_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new().with_task(Counting {
            runs: runs.clone(),
            fail: true,
        });
        let shutdown = Shutdown::new();

        let handle = scheduler.setup(context(shutdown.clone())).unwrap();
        assert_eq!(handle.names(), ["counting"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("task loop should stop on shutdown");

        let after = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn second_setup_is_refused() {
        let scheduler = Scheduler::new();
        let shutdown = Shutdown::new();

        assert!(scheduler.setup(context(shutdown.clone())).unwrap().is_empty());
        assert!(matches!(
            scheduler.setup(context(shutdown)),
            Err(SchedulerError::AlreadyStarted)
        ));
    }

    #[test]
    fn built_in_tasks_follow_config() {
        let mut config = AppConfig::default();
        assert_eq!(Scheduler::from_config(&config).task_names(), ["heartbeat"]);

        config.scheduler.upload_retention_secs = 60;
        assert_eq!(
            Scheduler::from_config(&config).task_names(),
            ["heartbeat", "upload_sweeper"]
        );

        config.scheduler.enabled = false;
        assert!(Scheduler::from_config(&config).task_names().is_empty());
    }
}
