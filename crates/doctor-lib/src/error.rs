//! Error taxonomy for the doctor
//!
//! Every failure is either recoverable (the cluster is not converged yet, try
//! again on the next tick) or fatal (stop the loop and let the platform restart
//! the process). Nothing else is distinguished.

use thiserror::Error;

/// Failure reported by the orchestration API boundary
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// Any other Kubernetes client or server failure
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl ApiError {
    /// Classify a kube error for a single named object, mapping HTTP 404 to `NotFound`
    pub fn from_kube(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => ApiError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => ApiError::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Error produced while diagnosing or repairing the cluster
#[derive(Debug, Error)]
pub enum DoctorError {
    /// Transient condition; the caller should keep looping
    #[error("{reason}")]
    Recoverable {
        reason: String,
        #[source]
        source: Option<ApiError>,
    },

    /// Unexpected API failure
    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    /// A resource the doctor cannot work without is structurally absent
    #[error("{0}")]
    Misconfigured(String),
}

impl DoctorError {
    /// Create a recoverable error with the given reason. An empty reason is allowed.
    pub fn recoverable(reason: impl Into<String>) -> Self {
        DoctorError::Recoverable {
            reason: reason.into(),
            source: None,
        }
    }

    /// Fatal error wrapping an API failure
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        DoctorError::Api {
            context: context.into(),
            source,
        }
    }

    /// Tag this error as recoverable, keeping its message and cause
    pub fn mark_recoverable(self) -> Self {
        match self {
            DoctorError::Recoverable { .. } => self,
            DoctorError::Api { context, source } => DoctorError::Recoverable {
                reason: format!("{context}: {source}"),
                source: Some(source),
            },
            DoctorError::Misconfigured(reason) => DoctorError::recoverable(reason),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, DoctorError::Recoverable { .. })
    }
}

/// Returns true when the result is `Ok` or carries a recoverable error
pub fn is_recoverable<T>(result: &Result<T, DoctorError>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => err.is_recoverable(),
    }
}

pub type Result<T, E = DoctorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn server_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: request timed out".to_string(),
            reason: "InternalError".to_string(),
            code,
        })
    }

    #[test]
    fn test_recoverable_is_recoverable() {
        let err = DoctorError::recoverable("nats cluster not found");
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "nats cluster not found");
    }

    #[test]
    fn test_empty_recoverable_has_empty_message() {
        let err = DoctorError::recoverable("");
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "");
    }

    #[test]
    fn test_unmarked_errors_are_fatal() {
        let api = DoctorError::api("list pods", ApiError::Kube(server_error(500)));
        assert!(!api.is_recoverable());

        let misconfigured = DoctorError::Misconfigured("deployment missing".to_string());
        assert!(!misconfigured.is_recoverable());

        let not_found = DoctorError::api(
            "get deployment",
            ApiError::NotFound {
                kind: "Deployment",
                namespace: "kyma-system".to_string(),
                name: "nats-operator".to_string(),
            },
        );
        assert!(!not_found.is_recoverable());
    }

    #[test]
    fn test_mark_recoverable_keeps_message() {
        let err = DoctorError::api("list pods", ApiError::Kube(server_error(500))).mark_recoverable();
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("list pods: "));
        assert!(std::error::Error::source(&err).is_some());

        let err = DoctorError::Misconfigured("pod missing".to_string()).mark_recoverable();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "pod missing");
    }

    #[test]
    fn test_is_recoverable_on_results() {
        let ok: Result<()> = Ok(());
        assert!(is_recoverable(&ok));

        let recoverable: Result<()> = Err(DoctorError::recoverable("not ready"));
        assert!(is_recoverable(&recoverable));

        let fatal: Result<()> = Err(DoctorError::Misconfigured("gone".to_string()));
        assert!(!is_recoverable(&fatal));
    }

    #[test]
    fn test_from_kube_maps_not_found() {
        let err = ApiError::from_kube(server_error(404), "Pod", "kyma-system", "nats-operator-0");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Pod kyma-system/nats-operator-0 not found");

        let err = ApiError::from_kube(server_error(500), "Pod", "kyma-system", "nats-operator-0");
        assert!(!err.is_not_found());
    }
}
