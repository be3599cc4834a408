//! Polling worker: repeatedly runs the pipeline, sleeping while the queue is idle.
//!
//! A failing job never stops the loop; pipeline errors are counted and logged.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use caseflow_core::JobState;

use crate::pipeline::WorkerPipeline;

/// Injectable sleep so tests can drive iterations without wall-clock waits.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Process at most one job, then return.
    Once,
    /// Poll until shut down.
    Forever,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub idle_polls: u64,
    pub errors: u64,
}

/// Handle to control a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the in-flight job to finish.
    pub async fn shutdown(self) -> WorkerStats {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "worker task ended abnormally");
        }
        self.stats.lock().await.clone()
    }

    pub async fn stats(&self) -> WorkerStats {
        self.stats.lock().await.clone()
    }
}

#[derive(Clone)]
pub struct PollWorker {
    name: String,
    pipeline: WorkerPipeline,
    poll_interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl PollWorker {
    pub fn new(name: impl Into<String>, pipeline: WorkerPipeline, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            pipeline,
            poll_interval,
            sleeper: Arc::new(TokioSleeper),
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn stats(&self) -> WorkerStats {
        self.stats.lock().await.clone()
    }

    /// One poll. Returns `true` when a job was processed.
    pub async fn tick(&self) -> bool {
        let outcome = self.pipeline.process_next().await;
        let mut stats = self.stats.lock().await;
        match outcome {
            Ok(Some(summary)) => {
                stats.processed += 1;
                match summary.state {
                    JobState::Succeeded => stats.succeeded += 1,
                    _ => stats.failed += 1,
                }
                true
            }
            Ok(None) => {
                stats.idle_polls += 1;
                false
            }
            Err(err) => {
                stats.errors += 1;
                error!(worker = %self.name, error = %err, "pipeline iteration failed");
                false
            }
        }
    }

    async fn tick_or_sleep(&self) {
        if !self.tick().await {
            self.sleeper.sleep(self.poll_interval).await;
        }
    }

    /// Run exactly `iterations` polls, sleeping after each idle one.
    pub async fn run_iterations(&self, iterations: usize) -> WorkerStats {
        for _ in 0..iterations {
            self.tick_or_sleep().await;
        }
        self.stats().await
    }

    /// `Once` polls a single time; `Forever` never returns.
    pub async fn run(&self, mode: WorkerMode) -> WorkerStats {
        info!(worker = %self.name, ?mode, poll_ms = self.poll_interval.as_millis() as u64, "worker started");
        match mode {
            WorkerMode::Once => {
                self.tick().await;
                self.stats().await
            }
            WorkerMode::Forever => loop {
                self.tick_or_sleep().await;
            },
        }
    }

    /// Run forever on a tokio task until the handle is shut down.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();

        let join = tokio::spawn(async move {
            info!(worker = %self.name, "worker spawned");
            while !*shutdown_rx.borrow() {
                if self.tick().await {
                    continue;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = self.sleeper.sleep(self.poll_interval) => {}
                }
            }
            info!(worker = %self.name, "worker stopped");
        });

        WorkerHandle {
            shutdown: shutdown_tx,
            join,
            stats,
        }
    }
}
