//! Self-healing supervisor for the NATS eventing cluster
//!
//! This crate provides:
//! - A recoverable/fatal error taxonomy
//! - A narrow orchestration API seam with a Kubernetes implementation
//! - Per-tick cluster state snapshots
//! - The doctor loop and its remediation rules
//! - Health checks and observability

pub mod cluster;
pub mod doctor;
pub mod error;
pub mod health;
pub mod observability;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use cluster::{ClusterApi, KubeClusterApi};
pub use doctor::{Doctor, DoctorBuilder, DoctorConfig, TickOutcome};
pub use error::{is_recoverable, ApiError, DoctorError};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use observability::{DoctorMetrics, StructuredLogger};
pub use snapshot::{Snapshot, StateProbe, Target};
