//! Doctor loop
//!
//! Wakes on a fixed interval, takes a fresh snapshot of the NATS cluster and
//! applies at most one remediation per tick. Fatal errors stop the loop and are
//! returned to the caller; recoverable ones are logged and retried next tick.

use super::diagnosis::{diagnose, Diagnosis, Remediation};
use crate::cluster::ClusterApi;
use crate::error::{DoctorError, Result};
use crate::health::{components, HealthRegistry};
use crate::observability::{DoctorMetrics, StructuredLogger};
use crate::snapshot::{Snapshot, StateProbe, Target};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the doctor loop
#[derive(Debug, Clone)]
pub struct DoctorConfig {
    /// Time between health evaluations (default: 60 seconds)
    pub interval: Duration,
    /// Objects under supervision
    pub target: Target,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            target: Target::default(),
        }
    }
}

/// Lifecycle state of the loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorState {
    Running,
    Stopped,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another eventing backend is active; nothing to supervise
    BackendInactive,
    /// Cluster not converged but no rule applies yet
    Deferred { reason: String },
    Healthy,
    Remediated(Remediation),
    /// The corrective write failed; the next tick will try again
    RemediationFailed(Remediation),
}

/// Periodic health check and auto-remediation of the NATS operator
pub struct Doctor {
    api: Arc<dyn ClusterApi>,
    probe: StateProbe,
    config: DoctorConfig,
    state: DoctorState,
    health: HealthRegistry,
    metrics: DoctorMetrics,
    logger: StructuredLogger,
}

impl Doctor {
    pub fn new(api: Arc<dyn ClusterApi>, config: DoctorConfig, health: HealthRegistry) -> Self {
        let probe = StateProbe::new(api.clone(), config.target.clone());
        let logger = StructuredLogger::new(&config.target.namespace);

        Self {
            api,
            probe,
            config,
            state: DoctorState::Running,
            health,
            metrics: DoctorMetrics::new(),
            logger,
        }
    }

    pub fn builder() -> DoctorBuilder {
        DoctorBuilder::new()
    }

    pub fn state(&self) -> DoctorState {
        self.state
    }

    /// Run until shutdown is signalled or a fatal error occurs
    ///
    /// Returns `Ok(())` on shutdown. Shutdown is only observed between ticks;
    /// a tick in progress always completes.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            namespace = %self.config.target.namespace,
            "Starting doctor loop"
        );

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Shutting down doctor loop");
                    self.state = DoctorState::Stopped;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "Fatal error, stopping doctor loop");
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Evaluate the cluster once and apply at most one remediation
    ///
    /// A fatal error moves the doctor to `Stopped`.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let start = Instant::now();
        let outcome = self.evaluate().await;
        self.metrics.observe_tick(start.elapsed().as_secs_f64());
        self.report(&outcome).await;

        if outcome.is_err() {
            self.state = DoctorState::Stopped;
        }
        outcome
    }

    async fn evaluate(&self) -> Result<TickOutcome> {
        if !self.probe.is_backend_applicable().await? {
            self.logger.log_backend_inactive();
            return Ok(TickOutcome::BackendInactive);
        }

        let mut snapshot = Snapshot::default();
        let pending = match self.probe.compute_all(&mut snapshot).await {
            Ok(()) => None,
            Err(err) if err.is_recoverable() => {
                debug!(reason = %err, "Cluster not converged");
                self.metrics.inc_recoverable();
                Some(err)
            }
            Err(err) => return Err(err),
        };
        self.metrics.set_servers(
            &self.config.target.namespace,
            snapshot.worker_desired_count,
            snapshot.worker_running_count,
        );

        match diagnose(&snapshot)? {
            Diagnosis::Remediate(remediation) => self.remediate(&mut snapshot, remediation).await,
            Diagnosis::Healthy if pending.is_none() => {
                info!(
                    servers_running = ?snapshot.worker_running_count,
                    servers_desired = ?snapshot.worker_desired_count,
                    "NATS cluster healthy"
                );
                Ok(TickOutcome::Healthy)
            }
            Diagnosis::Healthy | Diagnosis::Undetermined => {
                let reason = pending
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "desired server count unknown".to_string());
                self.logger.log_deferred(&reason);
                Ok(TickOutcome::Deferred { reason })
            }
        }
    }

    /// Apply one corrective write. Write failures are logged, not returned.
    pub(crate) async fn remediate(
        &self,
        snapshot: &mut Snapshot,
        remediation: Remediation,
    ) -> Result<TickOutcome> {
        let applied = match &remediation {
            Remediation::ScaleUpOperator { .. } => {
                let Some(mut deployment) = snapshot.operator_deployment.take() else {
                    return Err(DoctorError::Misconfigured(
                        "nats-operator deployment not found".to_string(),
                    ));
                };
                deployment.spec.get_or_insert_with(Default::default).replicas = Some(1);
                self.api.update_deployment(&deployment).await
            }
            Remediation::RestartOperator { namespace, pod, .. } => {
                snapshot.operator_pod = None;
                self.api.delete_pod(namespace, pod).await
            }
        };

        let action = remediation.action();
        let target = remediation.target();
        match applied {
            Ok(()) => {
                self.metrics.inc_remediation(action);
                self.logger
                    .log_remediation(action, &target, &remediation.cause());
                Ok(TickOutcome::Remediated(remediation))
            }
            Err(err) => {
                self.metrics.inc_remediation_failure(action);
                self.logger
                    .log_remediation_failed(action, &target, &err.to_string());
                Ok(TickOutcome::RemediationFailed(remediation))
            }
        }
    }

    async fn report(&self, outcome: &Result<TickOutcome>) {
        self.health.record_tick().await;

        match outcome {
            Ok(TickOutcome::Healthy) | Ok(TickOutcome::BackendInactive) => {
                self.health.set_healthy(components::DOCTOR).await;
            }
            Ok(TickOutcome::Deferred { reason }) => {
                self.health.set_degraded(components::DOCTOR, reason.clone()).await;
            }
            Ok(TickOutcome::Remediated(r)) => {
                self.health.set_degraded(components::DOCTOR, r.to_string()).await;
            }
            Ok(TickOutcome::RemediationFailed(r)) => {
                self.health
                    .set_degraded(components::DOCTOR, format!("failed: {r}"))
                    .await;
            }
            Err(err) => {
                self.health
                    .set_unhealthy(components::DOCTOR, err.to_string())
                    .await;
            }
        }

        match outcome {
            Err(err) if matches!(err, DoctorError::Api { .. }) => {
                self.health
                    .set_unhealthy(components::KUBE_API, err.to_string())
                    .await;
            }
            _ => self.health.set_healthy(components::KUBE_API).await,
        }
    }
}

/// Builder for creating the doctor
pub struct DoctorBuilder {
    api: Option<Arc<dyn ClusterApi>>,
    health: Option<HealthRegistry>,
    config: DoctorConfig,
}

impl DoctorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            api: None,
            health: None,
            config: DoctorConfig::default(),
        }
    }

    /// Set the orchestration API client
    pub fn cluster(mut self, api: Arc<dyn ClusterApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the health registry shared with the probe endpoints
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Replace the whole loop configuration
    pub fn config(mut self, config: DoctorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.config.target = target;
        self
    }

    pub fn build(self) -> anyhow::Result<Doctor> {
        let api = self
            .api
            .ok_or_else(|| anyhow::anyhow!("Cluster API is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Tick interval must be greater than zero");
        }

        Ok(Doctor::new(
            api,
            self.config,
            self.health.unwrap_or_default(),
        ))
    }
}

impl Default for DoctorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
