//! Kubernetes resource watchers.
//!
//! Runs one `kube_runtime::Controller` per kind. The XCluster controller also
//! owns XFirewall, so a change to a firewall re-dispatches its cluster through
//! the owner reference.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::{CrdError, Lifecycle, XCluster, XFirewall};
use futures::StreamExt;
use kube::{Api, Resource};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Identity used for per-resource retry tracking. Cluster and firewall share
/// namespace and name, so the kind is part of it.
fn retry_key<K: Resource<DynamicType = ()>>(obj: &K) -> String {
    let meta = obj.meta();
    format!(
        "{}/{}/{}",
        K::kind(&()),
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}

async fn reconcile_cluster(cluster: Arc<XCluster>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let key = cluster.object_key().ok_or(CrdError::MissingName)?;
    debug!("Reconciling XCluster {}", key);

    let outcome = reconciler.reconcile_cluster(&key).await?;
    reconciler.reset_retry_delay(&retry_key(cluster.as_ref()));
    Ok(outcome.into_action())
}

async fn reconcile_firewall(firewall: Arc<XFirewall>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let key = firewall.object_key().ok_or(CrdError::MissingName)?;
    debug!("Reconciling XFirewall {}", key);

    let outcome = reconciler.reconcile_firewall(&key).await?;
    reconciler.reset_retry_delay(&retry_key(firewall.as_ref()));
    Ok(outcome.into_action())
}

/// Retriable failures come back after a per-resource Fibonacci delay. Hard
/// errors wait for the next change to the resource.
fn error_policy<K: Resource<DynamicType = ()>>(obj: Arc<K>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let key = retry_key(obj.as_ref());
    if !error.is_retriable() {
        error!("Reconciliation of {} needs operator intervention: {}", key, error);
        return Action::await_change();
    }

    let delay = reconciler.next_retry_delay(&key);
    error!("Reconciliation of {} failed, retrying in {:?}: {}", key, delay, error);
    Action::requeue(delay)
}

/// Watches XCluster and XFirewall resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    cluster_api: Api<XCluster>,
    firewall_api: Api<XFirewall>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        cluster_api: Api<XCluster>,
        firewall_api: Api<XFirewall>,
        concurrency: u16,
    ) -> Self {
        Self {
            reconciler,
            cluster_api,
            firewall_api,
            concurrency,
        }
    }

    // One pass writes spec and status back to back; debounce folds the events.
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(self.concurrency)
    }

    /// Runs the XCluster controller until shutdown.
    pub async fn watch_clusters(&self) -> Result<(), ControllerError> {
        info!("Starting XCluster watcher");

        Controller::new(self.cluster_api.clone(), watcher::Config::default())
            .owns(self.firewall_api.clone(), watcher::Config::default())
            .with_config(self.runtime_config())
            .shutdown_on_signal()
            .run(reconcile_cluster, error_policy::<XCluster>, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, action)) => debug!("Reconciled XCluster {}: {:?}", obj, action),
                    Err(e) => warn!("XCluster controller: {}", e),
                }
            })
            .await;

        info!("XCluster watcher stopped");
        Ok(())
    }

    /// Runs the XFirewall controller until shutdown.
    pub async fn watch_firewalls(&self) -> Result<(), ControllerError> {
        info!("Starting XFirewall watcher");

        Controller::new(self.firewall_api.clone(), watcher::Config::default())
            .with_config(self.runtime_config())
            .shutdown_on_signal()
            .run(reconcile_firewall, error_policy::<XFirewall>, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, action)) => debug!("Reconciled XFirewall {}: {:?}", obj, action),
                    Err(e) => warn!("XFirewall controller: {}", e),
                }
            })
            .await;

        info!("XFirewall watcher stopped");
        Ok(())
    }
}
