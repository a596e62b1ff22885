//! In-memory cluster used by the unit tests

use crate::cluster::{async_trait, ClusterApi};
use crate::error::ApiError;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Pod, PodStatus, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const NAMESPACE: &str = "kyma-system";
pub const DEPLOYMENT_NAME: &str = "nats-operator";
pub const OPERATOR_LABEL: (&str, &str) = ("name", "nats-operator");
pub const SERVER_LABEL: (&str, &str) = ("nats_cluster", "eventing-nats");
pub const BACKEND_LABEL: (&str, &str) = ("kyma-project.io/eventing-backend", "beb");

/// API call recorded by [`FakeCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetClusterSize,
    GetDeployment,
    UpdateDeployment { name: String, replicas: Option<i32> },
    ListPods { label_selector: String },
    DeletePod { namespace: String, name: String },
    ListSecrets,
}

/// Which operation should fail with a server error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    ClusterSize,
    Deployment,
    ListPods,
    ListSecrets,
    UpdateDeployment,
    DeletePod,
}

#[derive(Default)]
pub struct FakeCluster {
    cluster_size: Option<i32>,
    deployment: Mutex<Option<Deployment>>,
    pods: Mutex<Vec<Pod>>,
    secrets: Vec<Secret>,
    failures: Vec<Fail>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster_size(mut self, size: i32) -> Self {
        self.cluster_size = Some(size);
        self
    }

    pub fn with_deployment(self, deployment: Deployment) -> Self {
        *self.deployment.lock().unwrap() = Some(deployment);
        self
    }

    pub fn with_pod(self, pod: Pod) -> Self {
        self.pods.lock().unwrap().push(pod);
        self
    }

    pub fn with_pods(self, pods: impl IntoIterator<Item = Pod>) -> Self {
        self.pods.lock().unwrap().extend(pods);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    pub fn failing(mut self, fail: Fail) -> Self {
        self.failures.push(fail);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded write calls only
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::UpdateDeployment { .. } | Call::DeletePod { .. }))
            .collect()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.pods.lock().unwrap().iter().map(|p| p.name_any()).collect()
    }

    pub fn deployment_replicas(&self) -> Option<i32> {
        self.deployment
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.replicas)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, fail: Fail) -> Result<(), ApiError> {
        if self.failures.contains(&fail) {
            return Err(ApiError::Kube(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "etcdserver: request timed out".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_cluster_size(&self, namespace: &str, name: &str) -> Result<i32, ApiError> {
        self.record(Call::GetClusterSize);
        self.check(Fail::ClusterSize)?;
        self.cluster_size.ok_or_else(|| ApiError::NotFound {
            kind: "NatsCluster",
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError> {
        self.record(Call::GetDeployment);
        self.check(Fail::Deployment)?;
        self.deployment
            .lock()
            .unwrap()
            .clone()
            .filter(|d| d.name_any() == name && d.namespace().as_deref() == Some(namespace))
            .ok_or_else(|| ApiError::NotFound {
                kind: "Deployment",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ApiError> {
        self.record(Call::UpdateDeployment {
            name: deployment.name_any(),
            replicas: deployment.spec.as_ref().and_then(|s| s.replicas),
        });
        self.check(Fail::UpdateDeployment)?;
        *self.deployment.lock().unwrap() = Some(deployment.clone());
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, ApiError> {
        self.record(Call::ListPods {
            label_selector: label_selector.to_string(),
        });
        self.check(Fail::ListPods)?;
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| matches_selector(p.labels(), label_selector))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        self.record(Call::DeletePod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.check(Fail::DeletePod)?;
        self.pods
            .lock()
            .unwrap()
            .retain(|p| !(p.name_any() == name && p.namespace().as_deref() == Some(namespace)));
        Ok(())
    }

    async fn list_secrets(&self, label_selector: &str) -> Result<Vec<Secret>, ApiError> {
        self.record(Call::ListSecrets);
        self.check(Fail::ListSecrets)?;
        Ok(self
            .secrets
            .iter()
            .filter(|s| matches_selector(s.labels(), label_selector))
            .cloned()
            .collect())
    }
}

/// Equality-based selector matching (`k=v,k2=v2`)
fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.trim().is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
            None => labels.contains_key(term.trim()),
        })
}

fn meta(name: &str, namespace: &str, labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: (!labels.is_empty()).then(|| {
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
        ..Default::default()
    }
}

pub fn deployment(name: &str, namespace: &str, replicas: Option<i32>) -> Deployment {
    Deployment {
        metadata: meta(name, namespace, &[]),
        spec: Some(DeploymentSpec {
            replicas,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn pod(name: &str, namespace: &str, label: (&str, &str), phase: Option<&str>) -> Pod {
    Pod {
        metadata: meta(name, namespace, &[label]),
        status: phase.map(|p| PodStatus {
            phase: Some(p.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn operator_pod(phase: Option<&str>) -> Pod {
    pod("nats-operator-7d9c5-x2x4q", NAMESPACE, OPERATOR_LABEL, phase)
}

pub fn server_pods(running: usize, total: usize) -> Vec<Pod> {
    (0..total)
        .map(|i| {
            let phase = if i < running { "Running" } else { "Pending" };
            pod(&format!("eventing-nats-{i}"), NAMESPACE, SERVER_LABEL, Some(phase))
        })
        .collect()
}

pub fn secret(name: &str, namespace: &str, labels: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: meta(name, namespace, labels),
        ..Default::default()
    }
}

#[test]
fn test_matches_selector() {
    let mut labels = BTreeMap::new();
    labels.insert("name".to_string(), "nats-operator".to_string());
    labels.insert("tier".to_string(), "control".to_string());

    assert!(matches_selector(&labels, "name=nats-operator"));
    assert!(matches_selector(&labels, "name=nats-operator,tier=control"));
    assert!(matches_selector(&labels, "tier"));
    assert!(!matches_selector(&labels, "name=nats-server"));
    assert!(!matches_selector(&labels, "nats_cluster=eventing-nats"));
}
