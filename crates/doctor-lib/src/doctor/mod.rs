//! Self-healing supervision of the NATS operator
//!
//! The doctor periodically snapshots the cluster, diagnoses it with a fixed
//! priority chain and issues at most one corrective write per tick.

mod diagnosis;
mod r#loop;


pub use diagnosis::{diagnose, Diagnosis, Remediation, RestartCause};
pub use r#loop::{Doctor, DoctorBuilder, DoctorConfig, DoctorState, TickOutcome};
