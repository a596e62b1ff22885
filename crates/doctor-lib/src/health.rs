//! Health tracking for the doctor process
//!
//! Backs the liveness and readiness probes of the doctor's own pod. The doctor
//! loop reports after every tick; a loop that stops ticking for longer than the
//! configured staleness window is reported unhealthy so the kubelet restarts it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Cluster not converged yet, doctor still working on it
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    /// Unix timestamp of the last completed tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_timestamp: Option<i64>,
}

impl HealthResponse {
    /// Compute overall status from component statuses
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    /// The remediation loop itself
    pub const DOCTOR: &str = "doctor";
    /// Reachability of the Kubernetes API server
    pub const KUBE_API: &str = "kube_api";
}

/// Health registry shared by the doctor loop and the probe endpoints
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    last_tick: Arc<RwLock<Option<i64>>>,
    /// Ticks older than this make the doctor unhealthy; `None` disables the check
    stale_after: Option<Duration>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            last_tick: Arc::new(RwLock::new(None)),
            stale_after: None,
        }
    }

    /// Registry that reports the doctor unhealthy once no tick completed within `window`
    pub fn with_staleness(window: Duration) -> Self {
        Self {
            stale_after: Some(window),
            ..Self::new()
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Record that the doctor finished a tick
    pub async fn record_tick(&self) {
        *self.last_tick.write().await = Some(chrono::Utc::now().timestamp());
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let mut components = self.components.read().await.clone();
        let last_tick = *self.last_tick.read().await;

        if let (Some(window), Some(ts)) = (self.stale_after, last_tick) {
            let age = chrono::Utc::now().timestamp() - ts;
            if age > window.as_secs() as i64 {
                components.insert(
                    components::DOCTOR.to_string(),
                    ComponentHealth::unhealthy(format!("no tick completed for {age}s")),
                );
            }
        }

        let status = HealthResponse::compute_status(&components);
        HealthResponse {
            status,
            components,
            last_tick_timestamp: last_tick,
        }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Doctor not yet initialized".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            let mut failing: Vec<String> = health
                .components
                .iter()
                .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
                .map(|(name, c)| match &c.message {
                    Some(message) => format!("{name}: {message}"),
                    None => name.clone(),
                })
                .collect();
            failing.sort();
            ReadinessResponse {
                ready: false,
                reason: Some(failing.join("; ")),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
