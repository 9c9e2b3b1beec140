//! Checkout simulator entry point.

use std::sync::Arc;

use app::{Config, Shell, StdTerminal, telemetry};
use checkout::{CheckoutOrchestrator, CheckoutPorts};
use domain::SharedCart;
use tokio::signal;
use workers::{RandomApproval, Services, SessionGate};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration and telemetry
    let config = Config::from_env();
    telemetry::init_tracing(&config)?;
    let metrics_handle = telemetry::install_metrics()?;

    // 2. Store and catalog
    let repos = app::open_store(&config).await?;

    // 3. Workers, idle until someone logs in
    let gate = SessionGate::new();
    let services = Services::new(
        SharedCart::new(),
        &repos,
        gate.clone(),
        &config.workers(),
        Arc::new(app::log_totals),
        Arc::new(RandomApproval::new(config.charge_approval_rate)),
    );
    let workers = services.spawn_workers();

    // 4. Checkout pipeline and console
    let checkout_config = config.checkout();
    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        CheckoutPorts::from_services(&services, &checkout_config),
        gate.clone(),
    ));
    let shell = Shell::new(
        Arc::new(StdTerminal::spawn()?),
        services.clone(),
        repos.catalog.clone(),
        orchestrator,
        checkout_config.shipping,
    );

    let exit = tokio::select! {
        exit = shell.run() => Some(exit),
        () = shutdown_signal() => None,
    };
    tracing::info!(?exit, "console closed");

    // 5. Stop every worker
    gate.shutdown();
    let report = workers.shutdown(config.shutdown_grace).await;
    if report.is_clean() {
        tracing::info!(stopped = report.stopped.len(), "workers stopped");
    } else {
        tracing::warn!(
            lagging = ?report.lagging,
            failed = ?report.failed,
            "workers did not stop cleanly"
        );
    }

    if config.metrics_dump {
        tracing::info!(metrics = %metrics_handle.render(), "final metrics");
    }
    Ok(())
}
