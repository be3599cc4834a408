use anyhow::Context;

use caseflow_infra::workers::PollWorker;
use caseflow_infra::{Services, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    caseflow_observability::init("caseflow-api", settings.log_format);

    if settings.api_key == caseflow_infra::config::DEFAULT_API_KEY {
        tracing::warn!("API_KEY not set; using insecure dev default");
    }

    let services = Services::from_settings(&settings)
        .await
        .context("failed to initialise services")?;

    // In-memory stores are invisible to a separate worker process.
    let embedded = if services.in_memory {
        tracing::info!("no database configured; starting embedded worker");
        let worker = PollWorker::new("embedded", services.pipeline.clone(), settings.poll_interval);
        Some(worker.spawn())
    } else {
        None
    };

    let app = caseflow_api::app::build_app(services, settings.api_key.clone());

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = embedded {
        let stats = handle.shutdown().await;
        tracing::info!(?stats, "embedded worker stopped");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
