//! `NatsCluster` custom resource, owned by the NATS operator
//!
//! The doctor only reads it to learn how many NATS servers the cluster should run.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "nats.io", version = "v1alpha2", kind = "NatsCluster")]
#[kube(namespaced, plural = "natsclusters")]
#[serde(rename_all = "camelCase")]
pub struct NatsClusterSpec {
    /// Desired number of NATS server pods
    #[serde(default)]
    pub size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_image: Option<String>,
}
