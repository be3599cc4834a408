//! Case pipeline worker: claims queued jobs and runs them to a terminal state.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use caseflow_infra::workers::{PollWorker, WorkerMode};
use caseflow_infra::{Services, Settings};

#[derive(Parser, Debug)]
#[command(name = "caseflow-worker")]
#[command(about = "Polls the job queue and runs the case pipeline")]
#[command(version)]
struct Args {
    /// Process at most one job, then exit
    #[arg(long, env = "WORKER_ONCE")]
    once: bool,

    /// Seconds between polls when the queue is empty (overrides WORKER_POLL_SECONDS)
    #[arg(long)]
    poll_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env().context("invalid configuration")?;
    caseflow_observability::init("caseflow-worker", settings.log_format);

    let poll_interval = args
        .poll_seconds
        .map(Duration::from_secs)
        .unwrap_or(settings.poll_interval);

    let services = Services::from_settings(&settings)
        .await
        .context("failed to initialise services")?;
    if services.in_memory {
        tracing::warn!("no DATABASE_URL; this worker only sees its own in-memory queue");
    }

    let worker = PollWorker::new("caseflow-worker", services.pipeline, poll_interval);

    if args.once {
        let stats = worker.run(WorkerMode::Once).await;
        info!(?stats, "single pass finished");
        return Ok(());
    }

    info!(poll_ms = poll_interval.as_millis() as u64, "worker started");
    let handle = worker.spawn();

    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown requested");

    let stats = handle.shutdown().await;
    info!(?stats, "worker stopped");
    Ok(())
}
