//! NATS Doctor - self-healing supervisor for the eventing NATS cluster
//!
//! Runs next to the nats-operator, periodically checks that the operator and
//! the NATS servers it manages are up, and scales or restarts the operator
//! when they are not.

use anyhow::{Context, Result};
use doctor_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    Doctor, KubeClusterApi,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const DOCTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ticks that may be missed before /healthz reports the doctor as stuck
const STALE_TICKS: u32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let settings = config::Settings::load()?;
    let doctor_config = settings.doctor_config();
    info!(
        namespace = %settings.namespace,
        cluster = %settings.cluster_name,
        "Doctor configured"
    );

    let health_registry = HealthRegistry::with_staleness(settings.tick_interval() * STALE_TICKS);
    health_registry.register(components::DOCTOR).await;
    health_registry.register(components::KUBE_API).await;

    let logger = StructuredLogger::new(&settings.namespace);
    logger.log_startup(DOCTOR_VERSION, settings.tick_interval_secs);

    let cluster = KubeClusterApi::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let api_port = settings.api_port;
    let api_health = health_registry.clone();
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, api_health).await {
            error!(error = %e, "API server failed");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signal_logger = logger.clone();
    tokio::spawn(async move {
        let reason = wait_for_signal().await;
        signal_logger.log_shutdown(reason);
        let _ = shutdown_tx.send(());
    });

    let doctor = Doctor::builder()
        .cluster(Arc::new(cluster))
        .health(health_registry.clone())
        .config(doctor_config)
        .build()?;

    health_registry.set_ready(true).await;

    match doctor.run(shutdown_rx).await {
        Ok(()) => {
            info!("Doctor stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Doctor stopped on fatal error");
            Err(e.into())
        }
    }
}

async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT received",
                _ = sigterm.recv() => "SIGTERM received",
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT received"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT received"
    }
}
