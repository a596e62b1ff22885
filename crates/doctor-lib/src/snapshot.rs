//! Point-in-time view of the NATS cluster's health
//!
//! A [`Snapshot`] is created empty at the start of every tick and filled by
//! [`StateProbe`]. Nothing is carried over from the previous tick.

use crate::cluster::{ClusterApi, PodPhase};
use crate::error::{DoctorError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Names and label selectors of the objects the doctor inspects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub namespace: String,
    /// Name of the `NatsCluster` resource holding the desired size
    pub cluster_name: String,
    pub operator_deployment: String,
    pub operator_selector: String,
    pub server_selector: String,
    /// Secrets matching this selector mean another eventing backend is active
    pub backend_secret_selector: String,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            namespace: "kyma-system".to_string(),
            cluster_name: "eventing-nats".to_string(),
            operator_deployment: "nats-operator".to_string(),
            operator_selector: "name=nats-operator".to_string(),
            server_selector: "nats_cluster=eventing-nats".to_string(),
            backend_secret_selector: "kyma-project.io/eventing-backend=beb".to_string(),
        }
    }
}

/// Observed cluster state for a single tick
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub operator_deployment: Option<Deployment>,
    pub operator_pod: Option<Pod>,
    /// `None` when the server pods were not listed this tick
    pub worker_running_count: Option<u32>,
    /// `None` until the `NatsCluster` resource has been read this tick
    pub worker_desired_count: Option<u32>,
}

impl Snapshot {
    /// Replica count requested on the operator deployment, if set
    pub fn operator_replicas(&self) -> Option<i32> {
        self.operator_deployment
            .as_ref()
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.replicas)
    }

    pub fn operator_pod_phase(&self) -> Option<PodPhase> {
        self.operator_pod.as_ref().map(PodPhase::of)
    }
}

/// Reads cluster state through the orchestration API. Does not retry.
#[derive(Clone)]
pub struct StateProbe {
    api: Arc<dyn ClusterApi>,
    target: Target,
}

impl StateProbe {
    pub fn new(api: Arc<dyn ClusterApi>, target: Target) -> Self {
        Self { api, target }
    }

    /// True unless an alternate eventing backend is in use
    pub async fn is_backend_applicable(&self) -> Result<bool> {
        let secrets = self
            .api
            .list_secrets(&self.target.backend_secret_selector)
            .await
            .map_err(|e| DoctorError::api("failed to list backend secrets", e))?;

        if !secrets.is_empty() {
            debug!(
                count = secrets.len(),
                selector = %self.target.backend_secret_selector,
                "Alternate backend secrets present"
            );
        }
        Ok(secrets.is_empty())
    }

    /// Run all compute steps in order, stopping at the first error
    pub async fn compute_all(&self, snapshot: &mut Snapshot) -> Result<()> {
        self.compute_desired_worker_count(snapshot).await?;
        self.compute_operator_deployment(snapshot).await?;
        self.compute_operator_pod(snapshot).await?;
        self.compute_running_worker_count(snapshot).await
    }

    pub async fn compute_desired_worker_count(&self, snapshot: &mut Snapshot) -> Result<()> {
        let t = &self.target;
        match self.api.get_cluster_size(&t.namespace, &t.cluster_name).await {
            Ok(size) => {
                snapshot.worker_desired_count = Some(u32::try_from(size).unwrap_or_default());
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(DoctorError::Recoverable {
                reason: format!("nats cluster {}/{} not found", t.namespace, t.cluster_name),
                source: Some(e),
            }),
            Err(e) => Err(DoctorError::api("failed to get nats cluster", e)),
        }
    }

    pub async fn compute_operator_deployment(&self, snapshot: &mut Snapshot) -> Result<()> {
        let t = &self.target;
        let deployment = match self
            .api
            .get_deployment(&t.namespace, &t.operator_deployment)
            .await
        {
            Ok(deployment) => deployment,
            Err(e) if e.is_not_found() => {
                snapshot.operator_deployment = None;
                return Err(DoctorError::Recoverable {
                    reason: format!(
                        "nats-operator deployment {}/{} not found",
                        t.namespace, t.operator_deployment
                    ),
                    source: Some(e),
                });
            }
            Err(e) => return Err(DoctorError::api("failed to get nats-operator deployment", e)),
        };

        snapshot.operator_deployment = Some(deployment);
        if snapshot.operator_replicas() == Some(0) {
            return Err(DoctorError::recoverable(
                "nats-operator deployment is scaled to zero replicas",
            ));
        }
        Ok(())
    }

    pub async fn compute_operator_pod(&self, snapshot: &mut Snapshot) -> Result<()> {
        let t = &self.target;
        let pods = self
            .api
            .list_pods(&t.namespace, &t.operator_selector)
            .await
            .map_err(|e| DoctorError::api("failed to list nats-operator pods", e))?;

        if pods.len() > 1 {
            warn!(
                count = pods.len(),
                selector = %t.operator_selector,
                "Multiple nats-operator pods matched, using the first"
            );
        }

        let Some(pod) = pods.into_iter().next() else {
            snapshot.operator_pod = None;
            return Err(DoctorError::recoverable("nats-operator pod not found"));
        };

        let phase = PodPhase::of(&pod);
        let name = pod.name_any();
        snapshot.operator_pod = Some(pod);
        if phase != PodPhase::Running {
            return Err(DoctorError::recoverable(format!(
                "nats-operator pod {name} is {phase}, not Running"
            )));
        }
        Ok(())
    }

    pub async fn compute_running_worker_count(&self, snapshot: &mut Snapshot) -> Result<()> {
        let t = &self.target;
        let pods = self
            .api
            .list_pods(&t.namespace, &t.server_selector)
            .await
            .map_err(|e| DoctorError::api("failed to list nats-server pods", e))?;

        if pods.is_empty() {
            snapshot.worker_running_count = Some(0);
            return Err(DoctorError::recoverable("no nats-server pods found"));
        }

        let running = pods
            .iter()
            .filter(|p| PodPhase::of(p) == PodPhase::Running)
            .count();
        snapshot.worker_running_count = Some(u32::try_from(running).unwrap_or(u32::MAX));
        Ok(())
    }
}
