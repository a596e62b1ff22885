//! `ClusterApi` backed by the Kubernetes API server

use super::{async_trait, ClusterApi, NatsCluster};
use crate::error::ApiError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Kubernetes client wrapper used by the doctor in production
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster service account or local kubeconfig
    pub async fn try_default() -> Result<Self, ApiError> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_cluster_size(&self, namespace: &str, name: &str) -> Result<i32, ApiError> {
        let api: Api<NatsCluster> = Api::namespaced(self.client.clone(), namespace);
        let cluster = api
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "NatsCluster", namespace, name))?;
        Ok(cluster.spec.size)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "Deployment", namespace, name))
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ApiError> {
        let namespace = deployment.namespace().unwrap_or_default();
        let name = deployment.name_any();
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), deployment)
            .await
            .map_err(|e| ApiError::from_kube(e, "Deployment", &namespace, &name))?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, ApiError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default().labels(label_selector)).await?;
        Ok(pods.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!(namespace = %namespace, pod = %name, "Pod already deleted");
                Ok(())
            }
            Err(e) => Err(ApiError::Kube(e)),
        }
    }

    async fn list_secrets(&self, label_selector: &str) -> Result<Vec<Secret>, ApiError> {
        let api: Api<Secret> = Api::all(self.client.clone());
        let secrets = api.list(&ListParams::default().labels(label_selector)).await?;
        Ok(secrets.items)
    }
}
