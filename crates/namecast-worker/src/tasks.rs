//! Periodic task runner with an explicit start and stop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_service::IngestService;

use crate::reaper::ScratchReaper;
use crate::session_sweeper::SessionSweeper;

/// Work run on a fixed interval.
#[async_trait]
pub trait PeriodicTask: Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Run one pass. Returns the number of items removed.
    async fn run_once(&self) -> Result<u64, AppError>;
}

/// Owner of the background loops.
///
/// Each task runs once immediately and then once per interval until
/// [`stop`](Self::stop) is called.
#[derive(Debug)]
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    /// Create an owner with no tasks.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Start the scratch reaper and the session sweeper for `service`.
    pub fn start(service: &IngestService, config: &AppConfig) -> Self {
        let mut tasks = Self::new();
        tasks.spawn(
            Arc::new(ScratchReaper::new(
                service.scratch().clone(),
                config.scratch.max_age(),
            )),
            config.scratch.sweep_interval(),
        );
        tasks.spawn(
            Arc::new(SessionSweeper::new(
                service.chunk_store(),
                config.ingest.session_stale_after(),
            )),
            config.ingest.session_sweep_interval(),
        );
        tasks
    }

    /// Run `task` now and every `every` after that.
    pub fn spawn(&mut self, task: Arc<dyn PeriodicTask>, every: Duration) {
        let name = task.name();
        let mut shutdown = self.shutdown.subscribe();
        info!(task = name, interval_s = every.as_secs(), "Background task started");

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match task.run_once().await {
                            Ok(removed) => {
                                debug!(task = name, removed, "Background pass complete");
                            }
                            Err(e) => {
                                error!(task = name, error = %e, "Background pass failed");
                            }
                        }
                    }
                }
            }
            info!(task = name, "Background task stopped");
        });
        self.handles.push((name, handle));
    }

    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no task is running.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every task and wait for it to finish its current pass.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Background task ended abnormally");
            }
        }
    }
}
