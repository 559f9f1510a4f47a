//! Controller-specific error types.
//!
//! Every failure names the reconciliation step that produced it, so a failed
//! pass can be traced back to the store or backend call behind it.

use crate::store::StoreError;
use crds::CrdError;
use kube::Error as KubeError;
use metal_client::MetalError;
use thiserror::Error;

/// Errors that can occur in the XCluster Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Resource store call failed
    #[error("error while {step}: {source}")]
    Store {
        step: &'static str,
        #[source]
        source: StoreError,
    },

    /// metal-api call failed
    #[error("error while {step}: {source}")]
    Metal {
        step: &'static str,
        #[source]
        source: MetalError,
    },

    /// The XCluster a firewall needs for provisioning cannot be used yet
    #[error("cluster unavailable: {0}")]
    ClusterUnavailable(String),

    /// More than one network matches the cluster's private network
    #[error("found {} networks matching the private network of {cluster}: {}", network_ids.len(), network_ids.join(", "))]
    InconsistentNetworks {
        cluster: String,
        network_ids: Vec<String>,
    },

    /// Resource is missing identity fields
    #[error("invalid resource: {0}")]
    InvalidResource(#[from] CrdError),

    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// metal-api client could not be built
    #[error("metal-api client error: {0}")]
    MetalClient(#[from] MetalError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    pub(crate) fn store(step: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| ControllerError::Store { step, source }
    }

    pub(crate) fn metal(step: &'static str) -> impl FnOnce(MetalError) -> Self {
        move |source| ControllerError::Metal { step, source }
    }

    /// Whether retrying the pass can succeed without operator intervention.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            ControllerError::InconsistentNetworks { .. } | ControllerError::InvalidResource(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_backend_failures_are_retriable() {
        let conflict = ControllerError::store("updating the XCluster")(StoreError::Conflict(
            "the object has been modified".to_string(),
        ));
        assert!(conflict.is_retriable());
        assert_eq!(
            conflict.to_string(),
            "error while updating the XCluster: conflict: the object has been modified"
        );

        let backend = ControllerError::metal("freeing the private network")(MetalError::Api(
            "503".to_string(),
        ));
        assert!(backend.is_retriable());
        assert!(ControllerError::ClusterUnavailable("default/c1".to_string()).is_retriable());
    }

    #[test]
    fn test_inconsistent_networks_is_not_retriable() {
        let err = ControllerError::InconsistentNetworks {
            cluster: "default/c1".to_string(),
            network_ids: vec!["net1".to_string(), "net2".to_string()],
        };
        assert!(!err.is_retriable());
        assert_eq!(
            err.to_string(),
            "found 2 networks matching the private network of default/c1: net1, net2"
        );
    }
}
