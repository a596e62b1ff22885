//! Observability infrastructure for the doctor
//!
//! Provides:
//! - Prometheus metrics (ticks, tick latency, remediations, server counts)
//! - Structured JSON logging of lifecycle and remediation events

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for tick latency (in seconds); a tick is a handful of API calls
const TICK_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DoctorMetricsInner> = OnceLock::new();

struct DoctorMetricsInner {
    ticks: IntCounter,
    tick_latency_seconds: Histogram,
    remediations: IntCounterVec,
    remediation_failures: IntCounterVec,
    recoverable_conditions: IntCounter,
    servers_desired: IntGaugeVec,
    servers_running: IntGaugeVec,
}

impl DoctorMetricsInner {
    fn new() -> Self {
        Self {
            ticks: register_int_counter!(
                "nats_doctor_ticks_total",
                "Number of health evaluations performed"
            )
            .expect("Failed to register ticks_total"),

            tick_latency_seconds: register_histogram!(
                "nats_doctor_tick_latency_seconds",
                "Time spent diagnosing and repairing the cluster per tick",
                TICK_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            remediations: register_int_counter_vec!(
                "nats_doctor_remediations_total",
                "Remediation actions applied, by action",
                &["action"]
            )
            .expect("Failed to register remediations_total"),

            remediation_failures: register_int_counter_vec!(
                "nats_doctor_remediation_failures_total",
                "Remediation actions whose API call failed, by action",
                &["action"]
            )
            .expect("Failed to register remediation_failures_total"),

            recoverable_conditions: register_int_counter!(
                "nats_doctor_recoverable_conditions_total",
                "Ticks that observed a recoverable, not yet converged cluster state"
            )
            .expect("Failed to register recoverable_conditions_total"),

            servers_desired: register_int_gauge_vec!(
                "nats_doctor_servers_desired",
                "Desired NATS server count from the NatsCluster resource",
                &["namespace"]
            )
            .expect("Failed to register servers_desired"),

            servers_running: register_int_gauge_vec!(
                "nats_doctor_servers_running",
                "NATS server pods in the Running phase",
                &["namespace"]
            )
            .expect("Failed to register servers_running"),
        }
    }
}

/// Doctor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same metrics.
#[derive(Clone)]
pub struct DoctorMetrics {
    _private: (),
}

impl Default for DoctorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DoctorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DoctorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DoctorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_tick(&self, duration_secs: f64) {
        self.inner().ticks.inc();
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn inc_remediation(&self, action: &str) {
        self.inner().remediations.with_label_values(&[action]).inc();
    }

    pub fn inc_remediation_failure(&self, action: &str) {
        self.inner()
            .remediation_failures
            .with_label_values(&[action])
            .inc();
    }

    pub fn inc_recoverable(&self) {
        self.inner().recoverable_conditions.inc();
    }

    /// Update server gauges from a snapshot. Counts not observed this tick keep
    /// their previous value.
    pub fn set_servers(&self, namespace: &str, desired: Option<u32>, running: Option<u32>) {
        if let Some(desired) = desired {
            self.inner()
                .servers_desired
                .with_label_values(&[namespace])
                .set(i64::from(desired));
        }
        if let Some(running) = running {
            self.inner()
                .servers_running
                .with_label_values(&[namespace])
                .set(i64::from(running));
        }
    }

    pub fn servers_running(&self, namespace: &str) -> i64 {
        self.inner()
            .servers_running
            .with_label_values(&[namespace])
            .get()
    }
}

/// Structured logger for doctor events
///
/// Emits consistent JSON-formatted events for lifecycle changes and remediation.
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "doctor_started",
            namespace = %self.namespace,
            doctor_version = %version,
            interval_secs = interval_secs,
            "NATS doctor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "doctor_shutdown",
            namespace = %self.namespace,
            reason = %reason,
            "NATS doctor shutting down"
        );
    }

    /// Log a successful remediation action
    pub fn log_remediation(&self, action: &str, target: &str, cause: &str) {
        warn!(
            event = "remediation_applied",
            namespace = %self.namespace,
            action = %action,
            target = %target,
            cause = %cause,
            "Remediation applied"
        );
    }

    pub fn log_remediation_failed(&self, action: &str, target: &str, error: &str) {
        warn!(
            event = "remediation_failed",
            namespace = %self.namespace,
            action = %action,
            target = %target,
            error = %error,
            "Remediation failed, will retry on next tick"
        );
    }

    /// Log that the cluster is not converged and nothing can be done this tick
    pub fn log_deferred(&self, reason: &str) {
        info!(
            event = "remediation_deferred",
            namespace = %self.namespace,
            reason = %reason,
            "Cluster not ready, skipping remediation"
        );
    }

    pub fn log_backend_inactive(&self) {
        info!(
            event = "backend_inactive",
            namespace = %self.namespace,
            "Alternate eventing backend active, skipping remediation"
        );
    }
}
