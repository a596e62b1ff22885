//! Remediation decision chain
//!
//! Rules are checked strictly in order and the first one that applies wins.
//! Reordering them changes behaviour.

use crate::cluster::PodPhase;
use crate::error::{DoctorError, Result};
use crate::snapshot::Snapshot;
use kube::ResourceExt;
use std::fmt;

/// Why the operator pod is being restarted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartCause {
    PodNotRunning(PodPhase),
    ServersBelowDesired { running: u32, desired: u32 },
}

impl fmt::Display for RestartCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartCause::PodNotRunning(phase) => write!(f, "operator pod is {phase}"),
            RestartCause::ServersBelowDesired { running, desired } => {
                write!(f, "{running} of {desired} nats servers running")
            }
        }
    }
}

/// A single corrective write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    /// Set the operator deployment back to one replica
    ScaleUpOperator { namespace: String, deployment: String },
    /// Delete the operator pod so its deployment recreates it
    RestartOperator {
        namespace: String,
        pod: String,
        cause: RestartCause,
    },
}

impl Remediation {
    /// Metric label for the action
    pub fn action(&self) -> &'static str {
        match self {
            Remediation::ScaleUpOperator { .. } => "scale_up_operator",
            Remediation::RestartOperator { .. } => "restart_operator",
        }
    }

    pub fn target(&self) -> String {
        match self {
            Remediation::ScaleUpOperator {
                namespace,
                deployment,
            } => format!("deployment/{namespace}/{deployment}"),
            Remediation::RestartOperator { namespace, pod, .. } => {
                format!("pod/{namespace}/{pod}")
            }
        }
    }

    pub fn cause(&self) -> String {
        match self {
            Remediation::ScaleUpOperator { .. } => "deployment scaled to zero replicas".to_string(),
            Remediation::RestartOperator { cause, .. } => cause.to_string(),
        }
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.action(), self.target(), self.cause())
    }
}

/// Result of evaluating the rules against a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// Desired server count unknown, nothing can be judged this tick
    Undetermined,
    Remediate(Remediation),
    Healthy,
}

/// Evaluate the remediation rules against a (possibly partial) snapshot
///
/// A missing deployment or operator pod is fatal: no local action brings them back.
pub fn diagnose(snapshot: &Snapshot) -> Result<Diagnosis> {
    let Some(desired) = snapshot.worker_desired_count else {
        return Ok(Diagnosis::Undetermined);
    };

    let Some(deployment) = snapshot.operator_deployment.as_ref() else {
        return Err(DoctorError::Misconfigured(
            "nats-operator deployment not found".to_string(),
        ));
    };

    if snapshot.operator_replicas() == Some(0) {
        return Ok(Diagnosis::Remediate(Remediation::ScaleUpOperator {
            namespace: deployment.namespace().unwrap_or_default(),
            deployment: deployment.name_any(),
        }));
    }

    let Some(pod) = snapshot.operator_pod.as_ref() else {
        return Err(DoctorError::Misconfigured(
            "nats-operator pod not found".to_string(),
        ));
    };

    let restart = |cause: RestartCause| -> Result<Diagnosis> {
        Ok(Diagnosis::Remediate(Remediation::RestartOperator {
            namespace: pod.namespace().unwrap_or_default(),
            pod: pod.name_any(),
            cause,
        }))
    };

    let phase = PodPhase::of(pod);
    if phase != PodPhase::Running {
        return restart(RestartCause::PodNotRunning(phase));
    }

    let running = snapshot.worker_running_count.unwrap_or_default();
    if running < desired {
        return restart(RestartCause::ServersBelowDesired { running, desired });
    }

    Ok(Diagnosis::Healthy)
}
