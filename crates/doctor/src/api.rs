//! Probe and metrics endpoints of the doctor's own pod
//!
//! `/healthz` backs the liveness probe: it fails once the doctor loop stopped on
//! a fatal error or stopped ticking. `/readyz` names the failing components.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use doctor_lib::health::{ComponentStatus, HealthRegistry};
use prometheus::{proto::MetricFamily, Encoder, TextEncoder};
use tracing::{error, info};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

async fn healthz(State(health): State<HealthRegistry>) -> Response {
    let health = health.health().await;

    // Degraded means a remediation is in progress, which the doctor handles itself
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health)).into_response()
}

async fn readyz(State(health): State<HealthRegistry>) -> Response {
    let readiness = health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness)).into_response()
}

async fn metrics() -> Response {
    render_metrics(&prometheus::gather())
}

fn render_metrics(families: &[MetricFamily]) -> Response {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", TEXT_CONTENT_TYPE)],
            e.to_string(),
        )
            .into_response();
    }

    (StatusCode::OK, [("content-type", TEXT_CONTENT_TYPE)], buffer).into_response()
}

pub fn create_router(health: HealthRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(health)
}

/// Serve the probe endpoints until the process exits
pub async fn serve(port: u16, health: HealthRegistry) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(health)).await?;

    Ok(())
}
