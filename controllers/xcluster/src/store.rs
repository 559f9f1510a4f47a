//! Resource store seam.
//!
//! The reconciler reads and writes XCluster and XFirewall records only through
//! `ResourceStore`, so passes can run against the API server (`KubeStore`) or
//! an in-memory store in tests.

use async_trait::async_trait;
use crds::{ObjectKey, XCluster, XFirewall};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a resource store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The write was based on a stale resourceVersion or the object already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(ae.message.clone()),
            other => StoreError::Kube(other),
        }
    }
}

/// Result of asking the store to delete a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// The record is marked for deletion but finalizers still hold it.
    Pending,
    /// The record no longer exists.
    Gone,
}

/// Narrow record store used by the reconcilers.
///
/// Full updates are optimistic-concurrency checked against the record's
/// resourceVersion; status writes only touch the status block. Every write
/// returns the persisted record so later writes in the same pass carry the
/// fresh version.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<XCluster>, StoreError>;

    async fn update_cluster(&self, cluster: &XCluster) -> Result<XCluster, StoreError>;

    async fn update_cluster_status(&self, cluster: &XCluster) -> Result<XCluster, StoreError>;

    async fn get_firewall(&self, key: &ObjectKey) -> Result<Option<XFirewall>, StoreError>;

    async fn create_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError>;

    async fn update_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError>;

    async fn update_firewall_status(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError>;

    /// Deletes the Firewall. A missing record counts as gone.
    async fn delete_firewall(&self, key: &ObjectKey) -> Result<Deletion, StoreError>;
}

/// `ResourceStore` backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let key = key_of(object)?;
        Ok(self
            .api::<K>(&key.namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn replace<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let key = key_of(object)?;
        Ok(self
            .api::<K>(&key.namespace)
            .replace(&key.name, &PostParams::default(), object)
            .await?)
    }

    async fn patch_status<K, S>(&self, object: &K, status: &Option<S>) -> Result<K, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
        S: Serialize,
    {
        let key = key_of(object)?;
        let patch = serde_json::json!({ "status": status });
        Ok(self
            .api::<K>(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }
}

fn key_of<K: Resource>(object: &K) -> Result<ObjectKey, StoreError> {
    use crds::Lifecycle;
    object
        .object_key()
        .ok_or_else(|| StoreError::NotFound("object without namespace or name".to_string()))
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<XCluster>, StoreError> {
        self.get(key).await
    }

    async fn update_cluster(&self, cluster: &XCluster) -> Result<XCluster, StoreError> {
        self.replace(cluster).await
    }

    async fn update_cluster_status(&self, cluster: &XCluster) -> Result<XCluster, StoreError> {
        self.patch_status(cluster, &cluster.status).await
    }

    async fn get_firewall(&self, key: &ObjectKey) -> Result<Option<XFirewall>, StoreError> {
        self.get(key).await
    }

    async fn create_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        self.create(firewall).await
    }

    async fn update_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        self.replace(firewall).await
    }

    async fn update_firewall_status(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        self.patch_status(firewall, &firewall.status).await
    }

    async fn delete_firewall(&self, key: &ObjectKey) -> Result<Deletion, StoreError> {
        let api: Api<XFirewall> = self.api(&key.namespace);
        match api.delete(&key.name, &DeleteParams::default()).await {
            // The object comes back while finalizers are still pending.
            Ok(response) if response.is_left() => Ok(Deletion::Pending),
            Ok(_) => Ok(Deletion::Gone),
            Err(e) => match StoreError::from(e) {
                StoreError::NotFound(_) => {
                    debug!("XFirewall {} already gone", key);
                    Ok(Deletion::Gone)
                }
                other => Err(other),
            },
        }
    }
}
