//! Doctor configuration
//!
//! Every field can be overridden from the environment with the `DOCTOR_` prefix,
//! e.g. `DOCTOR_NAMESPACE=eventing` or `DOCTOR_TICK_INTERVAL_SECS=30`.

use anyhow::{Context, Result};
use doctor_lib::{DoctorConfig, Target};
use serde::Deserialize;
use std::time::Duration;

/// Process configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between health evaluations
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Namespace holding the NATS cluster and its operator
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name of the NatsCluster resource
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Name of the nats-operator deployment
    #[serde(default = "default_operator_deployment")]
    pub operator_deployment: String,

    #[serde(default = "default_operator_selector")]
    pub operator_selector: String,

    #[serde(default = "default_server_selector")]
    pub server_selector: String,

    /// Secrets matching this selector mark another eventing backend as active
    #[serde(default = "default_backend_secret_selector")]
    pub backend_secret_selector: String,
}

fn default_api_port() -> u16 {
    8080
}

fn default_tick_interval() -> u64 {
    60
}

fn default_namespace() -> String {
    "kyma-system".to_string()
}

fn default_cluster_name() -> String {
    "eventing-nats".to_string()
}

fn default_operator_deployment() -> String {
    "nats-operator".to_string()
}

fn default_operator_selector() -> String {
    "name=nats-operator".to_string()
}

fn default_server_selector() -> String {
    "nats_cluster=eventing-nats".to_string()
}

fn default_backend_secret_selector() -> String {
    "kyma-project.io/eventing-backend=beb".to_string()
}

impl Settings {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("DOCTOR"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if settings.tick_interval_secs == 0 {
            anyhow::bail!("tick_interval_secs must be greater than zero");
        }
        Ok(settings)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Doctor loop configuration derived from these settings
    pub fn doctor_config(&self) -> DoctorConfig {
        DoctorConfig {
            interval: self.tick_interval(),
            target: Target {
                namespace: self.namespace.clone(),
                cluster_name: self.cluster_name.clone(),
                operator_deployment: self.operator_deployment.clone(),
                operator_selector: self.operator_selector.clone(),
                server_selector: self.server_selector.clone(),
                backend_secret_selector: self.backend_secret_selector.clone(),
            },
        }
    }
}
