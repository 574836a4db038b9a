//! SFU signaling server binary.

#![warn(clippy::pedantic)]

use anyhow::Context;
use media_engine::{default_media_codecs, LocalEngine, MediaEngine};
use sfu_signaling::actors::{SessionActorHandle, SessionMetrics};
use sfu_signaling::config::Config;
use sfu_signaling::observability::{observability_router, HealthState};
use sfu_signaling::signaling::SignalingServer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Grace delay before exiting after the engine worker dies, so the fatal
/// log lines reach the collector.
const WORKER_DEATH_FLUSH_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        sfu_id = %config.sfu_id,
        signaling = %config.signaling_bind_address,
        health = %config.health_bind_address,
        "Starting SFU signaling server"
    );

    let engine = LocalEngine::new();
    let worker = engine
        .create_worker(config.worker_settings())
        .await
        .context("failed to create engine worker")?;
    info!(pid = worker.pid(), "Engine worker created");

    // Worker death is unrecoverable: log, let the logs flush, exit nonzero.
    let died = worker.died();
    tokio::spawn(async move {
        died.cancelled().await;
        error!("Engine worker died, terminating");
        tokio::time::sleep(WORKER_DEATH_FLUSH_DELAY).await;
        std::process::exit(1);
    });

    let metrics = Arc::new(SessionMetrics::new());
    let session = SessionActorHandle::new(
        worker,
        default_media_codecs(),
        config.transport_options(),
        Arc::clone(&metrics),
    );

    let health_state = Arc::new(HealthState::new());
    let app = observability_router(Arc::clone(&health_state), session.clone(), metrics);
    let health_listener = tokio::net::TcpListener::bind(&config.health_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.health_bind_address))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, app).await {
            error!(error = %e, "Health server failed");
        }
    });

    let server = SignalingServer::bind(&config.signaling_bind_address)
        .await
        .context("failed to bind signaling listener")?;
    health_state.set_ready();

    let server_task = tokio::spawn(server.run(session.clone(), session.child_token()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    health_state.set_not_ready();
    session.cancel();
    let _ = server_task.await;

    info!("Shutdown complete");
    Ok(())
}
