//! Test utilities for unit testing reconcilers
//!
//! `InMemoryStore` behaves like the API server where the reconcilers can
//! observe it: full updates are rejected on a stale resourceVersion, status
//! writes leave the spec alone and vice versa, deletion waits for finalizers.

use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::store::{Deletion, ResourceStore, StoreError};
use async_trait::async_trait;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::{Resource, ResourceExt};
use metal_client::{MockMetalClient, Network};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Store calls, used for write journaling and conflict injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    UpdateCluster,
    UpdateClusterStatus,
    CreateFirewall,
    UpdateFirewall,
    UpdateFirewallStatus,
    DeleteFirewall,
}

#[derive(Default)]
struct State {
    clusters: HashMap<ObjectKey, XCluster>,
    firewalls: HashMap<ObjectKey, XFirewall>,
    version: u64,
    writes: Vec<StoreOp>,
    conflicting: HashSet<StoreOp>,
}

impl State {
    fn next_version(&mut self) -> Option<String> {
        self.version += 1;
        Some(self.version.to_string())
    }

    fn write(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if self.conflicting.contains(&op) {
            return Err(StoreError::Conflict(format!("injected conflict for {:?}", op)));
        }
        self.writes.push(op);
        Ok(())
    }
}

/// In-memory `ResourceStore`. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Persists `cluster` as if a user applied it and returns the stored record.
    pub fn insert_cluster(&self, mut cluster: XCluster) -> XCluster {
        let mut state = self.state();
        persist_new(&mut cluster, state.next_version());
        state.clusters.insert(key_of(&cluster), cluster.clone());
        cluster
    }

    /// Persists `firewall` as if it already existed.
    pub fn insert_firewall(&self, mut firewall: XFirewall) -> XFirewall {
        let mut state = self.state();
        persist_new(&mut firewall, state.next_version());
        state.firewalls.insert(key_of(&firewall), firewall.clone());
        firewall
    }

    pub fn cluster(&self, key: &ObjectKey) -> Option<XCluster> {
        self.state().clusters.get(key).cloned()
    }

    pub fn firewall(&self, key: &ObjectKey) -> Option<XFirewall> {
        self.state().firewalls.get(key).cloned()
    }

    /// Marks the cluster for deletion the way a user's delete request does.
    pub fn request_cluster_deletion(&self, key: &ObjectKey) {
        let mut state = self.state();
        let version = state.next_version();
        mark_deleted(&mut state.clusters, key, version);
    }

    /// Marks the firewall for deletion the way a user's delete request does.
    pub fn request_firewall_deletion(&self, key: &ObjectKey) {
        let mut state = self.state();
        let version = state.next_version();
        mark_deleted(&mut state.firewalls, key, version);
    }

    /// Sets the firewall's reported readiness behind the reconciler's back.
    pub fn set_firewall_ready(&self, key: &ObjectKey, ready: bool) {
        let mut state = self.state();
        let version = state.next_version();
        if let Some(fw) = state.firewalls.get_mut(key) {
            fw.status = Some(XFirewallStatus { ready });
            fw.metadata.resource_version = version;
        }
    }

    /// Rejects every subsequent `op` with a conflict.
    pub fn conflict_on(&self, op: StoreOp) {
        self.state().conflicting.insert(op);
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> Vec<StoreOp> {
        self.state().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state().writes.len()
    }
}

fn key_of<K: Resource>(object: &K) -> ObjectKey {
    object.object_key().expect("test objects carry namespace and name")
}

fn persist_new<K: Resource>(object: &mut K, version: Option<String>) {
    let name = object.name_any();
    let meta = object.meta_mut();
    meta.uid.get_or_insert_with(|| format!("uid-{}", name));
    meta.resource_version = version;
}

fn mark_deleted<K: Resource>(records: &mut HashMap<ObjectKey, K>, key: &ObjectKey, version: Option<String>) {
    let Some(record) = records.get_mut(key) else {
        return;
    };
    if record.finalizers().is_empty() {
        records.remove(key);
        return;
    }
    record.meta_mut().deletion_timestamp.get_or_insert_with(deletion_time);
    record.meta_mut().resource_version = version;
}

/// Full update with optimistic concurrency. The stored status is kept, and
/// releasing the last finalizer of a deleted record removes it.
fn replace<K: Resource + Clone>(
    records: &mut HashMap<ObjectKey, K>,
    object: &K,
    version: Option<String>,
    keep_status: impl FnOnce(&mut K, &K),
) -> Result<K, StoreError> {
    let key = key_of(object);
    let stored = records
        .get(&key)
        .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
    if stored.meta().resource_version != object.meta().resource_version {
        return Err(StoreError::Conflict(format!("{} has been modified", key)));
    }

    let mut updated = object.clone();
    keep_status(&mut updated, stored);
    updated.meta_mut().uid = stored.meta().uid.clone();
    updated.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
    updated.meta_mut().resource_version = version;

    if updated.is_being_deleted() && updated.finalizers().is_empty() {
        records.remove(&key);
    } else {
        records.insert(key, updated.clone());
    }
    Ok(updated)
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<XCluster>, StoreError> {
        Ok(self.cluster(key))
    }

    async fn update_cluster(&self, cluster: &XCluster) -> Result<XCluster, StoreError> {
        let mut state = self.state();
        state.write(StoreOp::UpdateCluster)?;
        let version = state.next_version();
        replace(&mut state.clusters, cluster, version, |new, old| {
            new.status = old.status.clone()
        })
    }

    async fn update_cluster_status(&self, cluster: &XCluster) -> Result<XCluster, StoreError> {
        let mut state = self.state();
        state.write(StoreOp::UpdateClusterStatus)?;
        let version = state.next_version();
        let key = key_of(cluster);
        let stored = state
            .clusters
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        stored.status = cluster.status.clone();
        stored.metadata.resource_version = version;
        Ok(stored.clone())
    }

    async fn get_firewall(&self, key: &ObjectKey) -> Result<Option<XFirewall>, StoreError> {
        Ok(self.firewall(key))
    }

    async fn create_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        let mut state = self.state();
        state.write(StoreOp::CreateFirewall)?;
        let key = key_of(firewall);
        if state.firewalls.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{} already exists", key)));
        }
        let mut created = firewall.clone();
        persist_new(&mut created, state.next_version());
        state.firewalls.insert(key, created.clone());
        Ok(created)
    }

    async fn update_firewall(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        let mut state = self.state();
        state.write(StoreOp::UpdateFirewall)?;
        let version = state.next_version();
        replace(&mut state.firewalls, firewall, version, |new, old| {
            new.status = old.status.clone()
        })
    }

    async fn update_firewall_status(&self, firewall: &XFirewall) -> Result<XFirewall, StoreError> {
        let mut state = self.state();
        state.write(StoreOp::UpdateFirewallStatus)?;
        let version = state.next_version();
        let key = key_of(firewall);
        let stored = state
            .firewalls
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        stored.status = firewall.status.clone();
        stored.metadata.resource_version = version;
        Ok(stored.clone())
    }

    async fn delete_firewall(&self, key: &ObjectKey) -> Result<Deletion, StoreError> {
        let mut state = self.state();
        if !state.firewalls.contains_key(key) {
            return Ok(Deletion::Gone);
        }
        state.write(StoreOp::DeleteFirewall)?;
        let version = state.next_version();
        mark_deleted(&mut state.firewalls, key, version);
        if state.firewalls.contains_key(key) {
            Ok(Deletion::Pending)
        } else {
            Ok(Deletion::Gone)
        }
    }
}

pub fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2024-05-01T10:00:00Z")).expect("valid timestamp")
}

pub fn test_key() -> ObjectKey {
    ObjectKey::new("default", "c1")
}

/// XCluster `default/c1` in partition `p1` for project `proj1`, with a
/// firewall template on network `net0`.
pub fn create_test_cluster() -> XCluster {
    XCluster {
        metadata: ObjectMeta {
            name: Some("c1".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: XClusterSpec {
            partition: "p1".to_string(),
            project_id: "proj1".to_string(),
            private_network_id: String::new(),
            x_firewall_template: XFirewallTemplate {
                metadata: TemplateMeta {
                    labels: Some(BTreeMap::from([("tier".to_string(), "edge".to_string())])),
                    annotations: None,
                },
                spec: XFirewallSpec {
                    default_network_id: "net0".to_string(),
                    image: "firewall-ubuntu-2.0".to_string(),
                    machine_id: String::new(),
                    size: "c1-xlarge-x86".to_string(),
                },
            },
        },
        status: None,
    }
}

/// XFirewall `default/c1` owned by `cluster`, as stamped from its template.
pub fn create_test_firewall(cluster: &XCluster) -> XFirewall {
    cluster.firewall_from_template().expect("persisted cluster")
}

/// Backend network matching the given cluster's partition and project.
pub fn create_test_network(id: &str) -> Network {
    Network {
        id: id.to_string(),
        name: Some("p1".to_string()),
        partition_id: Some("p1".to_string()),
        project_id: Some("proj1".to_string()),
        prefixes: vec!["10.0.0.0/22".to_string()],
    }
}

pub const REQUEUE_AFTER: Duration = Duration::from_secs(10);

/// Reconciler wired to the given test doubles.
pub fn create_test_reconciler(store: &InMemoryStore, metal: &MockMetalClient) -> Reconciler {
    Reconciler::new(
        store.clone(),
        metal.clone(),
        ReconcilerSettings {
            requeue_after: REQUEUE_AFTER,
            ..Default::default()
        },
    )
}
