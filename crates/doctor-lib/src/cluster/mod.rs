//! Access to the orchestration API
//!
//! The doctor talks to Kubernetes only through [`ClusterApi`], which covers the
//! handful of reads and writes it needs. [`KubeClusterApi`] is the production
//! implementation backed by a `kube::Client`.

mod client;
mod crd;

pub use client::KubeClusterApi;
pub use crd::{NatsCluster, NatsClusterSpec};

use crate::error::ApiError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Secret};

pub use async_trait::async_trait;

/// Operations the doctor needs from the orchestration API
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Desired server count from the `NatsCluster` resource
    async fn get_cluster_size(&self, namespace: &str, name: &str) -> Result<i32, ApiError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError>;

    /// Overwrite a deployment with the given object
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ApiError>;

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, ApiError>;

    /// Delete a pod. A pod that is already gone counts as deleted.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ApiError>;

    /// List secrets across all namespaces
    async fn list_secrets(&self, label_selector: &str) -> Result<Vec<Secret>, ApiError>;
}

/// Lifecycle phase reported in a pod's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Read the phase of a pod; a missing or unrecognised phase is `Unknown`
    pub fn of(pod: &Pod) -> Self {
        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
