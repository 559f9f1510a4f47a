//! Finalizer and deletion helpers shared by XCluster and XFirewall.
//!
//! Every mutator reports whether it changed the object so reconcilers only
//! persist when something actually moved.

use std::fmt;

use kube::{Resource, ResourceExt};

/// (namespace, name) identity of a namespaced resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle view over any Kubernetes resource.
pub trait Lifecycle: Resource + Sized {
    /// True once deletion was requested and finalizers are still pending.
    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Adds `finalizer` unless present. Returns whether it was added.
    fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers_mut().push(finalizer.to_string());
        true
    }

    /// Removes every occurrence of `finalizer`. Returns whether any was removed.
    fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        finalizers.len() != before
    }

    /// The (namespace, name) identity, if both are set.
    fn object_key(&self) -> Option<ObjectKey> {
        let meta = self.meta();
        Some(ObjectKey::new(meta.namespace.clone()?, meta.name.clone()?))
    }
}

impl<K: Resource> Lifecycle for K {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{XCluster, XClusterSpec, XFirewall, XFirewallSpec, XCLUSTER_FINALIZER, XFIREWALL_FINALIZER};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn cluster() -> XCluster {
        let mut cl = XCluster::new(
            "c1",
            XClusterSpec {
                partition: "p1".to_string(),
                project_id: "proj1".to_string(),
                ..Default::default()
            },
        );
        cl.metadata.namespace = Some("default".to_string());
        cl.metadata.uid = Some("uid-c1".to_string());
        cl
    }

    #[test]
    fn test_add_finalizer_is_idempotent() {
        let mut cl = cluster();
        assert!(cl.add_finalizer(XCLUSTER_FINALIZER));
        assert!(!cl.add_finalizer(XCLUSTER_FINALIZER));
        assert_eq!(cl.finalizers(), &[XCLUSTER_FINALIZER.to_string()]);
    }

    #[test]
    fn test_remove_finalizer_keeps_foreign_finalizers() {
        let mut fw = XFirewall::new("c1", XFirewallSpec::default());
        fw.metadata.finalizers = Some(vec![
            "other.example.com/cleanup".to_string(),
            XFIREWALL_FINALIZER.to_string(),
        ]);
        assert!(fw.remove_finalizer(XFIREWALL_FINALIZER));
        assert!(!fw.remove_finalizer(XFIREWALL_FINALIZER));
        assert_eq!(fw.finalizers(), &["other.example.com/cleanup".to_string()]);
    }

    fn claim<K: Lifecycle>(obj: &mut K, finalizer: &str) -> bool {
        obj.add_finalizer(finalizer) && obj.has_finalizer(finalizer)
    }

    #[test]
    fn test_lifecycle_through_generic_bound() {
        let mut cl = cluster();
        assert!(claim(&mut cl, XCLUSTER_FINALIZER));
        let mut fw = XFirewall::new("c1", XFirewallSpec::default());
        assert!(claim(&mut fw, XFIREWALL_FINALIZER));
        assert!(fw.remove_finalizer(XFIREWALL_FINALIZER));
    }

    #[test]
    fn test_deletion_marker() {
        let mut cl = cluster();
        assert!(!cl.is_being_deleted());
        let ts: Time = serde_json::from_value(serde_json::json!("2024-05-01T10:00:00Z"))
            .expect("valid timestamp");
        cl.metadata.deletion_timestamp = Some(ts);
        assert!(cl.is_being_deleted());
    }

    #[test]
    fn test_object_key() {
        let cl = cluster();
        assert_eq!(cl.object_key(), Some(ObjectKey::new("default", "c1")));
        assert_eq!(ObjectKey::new("default", "c1").to_string(), "default/c1");

        let fw = XFirewall::new("c1", XFirewallSpec::default());
        assert_eq!(fw.object_key(), None);
    }
}
