use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleetgen_core::{GenerationController, GeneratorConfig, MemoryBus};
use fleetgen_server::config::DEFAULT_LOG_FILTER;
use fleetgen_server::{create_router, AppState, RoleValidator, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let server_config = ServerConfig::from_env().context("invalid server configuration")?;
    let generator_config = GeneratorConfig::from_env().context("invalid generator configuration")?;

    let bus = MemoryBus::new(server_config.bus_capacity);
    let controller = Arc::new(
        GenerationController::new(generator_config, Arc::new(bus.clone()))
            .context("failed to create generation controller")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(
        controller.clone(),
        bus,
        Arc::new(RoleValidator::new(server_config.enforce_roles)),
        shutdown_rx,
    );
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", server_config.port);
    info!(
        addr = %addr,
        enforce_roles = server_config.enforce_roles,
        topic = %controller.config().generated_topic,
        "Starting fleet generator server"
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let teardown = controller.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            teardown.shutdown().await;
            // Ends open SSE streams so in-flight connections can close
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!(
        generated_count = controller.status().generated_count,
        "Server stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
