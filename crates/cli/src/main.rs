//! Postwright: the main entry point.
//!
//! Connects to the Coral bus, then answers every mention with five generated
//! posts until interrupted (Ctrl-C / SIGTERM). All settings come from the
//! environment; see `postwright_config::WorkerConfig`.

use std::process::ExitCode;
use std::sync::Arc;

use postwright_agent::{ResponsePipeline, Worker, WorkerExit};
use postwright_bus::CoralBus;
use postwright_config::WorkerConfig;
use postwright_core::{MessageBus, Provider};
use postwright_providers::OpenAiCompatProvider;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(WorkerExit::Shutdown) => ExitCode::SUCCESS,
        Ok(WorkerExit::FailureLimit { failures }) => {
            error!(failures, "Giving up after repeated failures");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<WorkerExit, Box<dyn std::error::Error>> {
    let config = WorkerConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider: Arc<dyn Provider> = Arc::new(
        OpenAiCompatProvider::from_config(&config.generator)
            .map_err(|e| format!("Failed to initialize content generator: {e}"))?,
    );
    match provider.health_check().await {
        Ok(true) => info!(provider = provider.name(), model = %config.generator.model, "Content generator reachable"),
        Ok(false) => warn!(provider = provider.name(), "Content generator reported unhealthy"),
        Err(e) => warn!(provider = provider.name(), "Content generator health check failed: {e}"),
    }

    let bus: Arc<dyn MessageBus> = Arc::new(
        CoralBus::connect(&config.bus)
            .await
            .map_err(|e| format!("Failed to connect to bus: {e}"))?,
    );

    let pipeline = ResponsePipeline::from_config(provider, bus.clone(), &config.generator);
    let worker = Worker::new(bus.clone(), Arc::new(pipeline), config.worker.clone());

    info!(agent_id = %config.bus.agent_id, "Postwright ready, waiting for mentions");
    let report = worker.run(shutdown_signal()).await;

    if let Err(e) = bus.close().await {
        warn!("Error closing bus connection: {e}");
    }

    info!(
        completed = report.cycles_completed,
        failed = report.cycles_failed,
        "Postwright stopped"
    );
    Ok(report.exit)
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
