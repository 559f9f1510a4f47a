//! XCluster reconciliation.
//!
//! Converges the private network and the owned XFirewall of a cluster and
//! mirrors the firewall's readiness onto the cluster. On deletion the firewall
//! is torn down first, then the private network is freed, then the finalizer
//! is released.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::store::Deletion;
use crds::{Lifecycle, ObjectKey, XCluster, XClusterStatus, XCLUSTER_FINALIZER};
use metal_client::{NetworkAllocateRequest, NetworkFindRequest};
use tracing::{debug, info, warn};

impl Reconciler {
    /// Runs one reconciliation pass for the XCluster identified by `key`.
    pub async fn reconcile_cluster(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let Some(mut cluster) = self
            .store
            .get_cluster(key)
            .await
            .map_err(ControllerError::store("fetching the XCluster"))?
        else {
            debug!("XCluster {} no longer exists, nothing to do", key);
            return Ok(ReconcileOutcome::Converged);
        };

        if cluster.is_being_deleted() {
            return self.finalize_cluster(key, cluster).await;
        }

        if cluster.add_finalizer(XCLUSTER_FINALIZER) {
            cluster = self
                .store
                .update_cluster(&cluster)
                .await
                .map_err(ControllerError::store("adding the XCluster finalizer"))?;
            info!("Added finalizer to XCluster {}", key);
        }

        if cluster.spec.private_network_id.is_empty() {
            cluster = self.allocate_private_network(key, cluster).await?;
        }

        let firewall = match self
            .store
            .get_firewall(key)
            .await
            .map_err(ControllerError::store("fetching the owned XFirewall"))?
        {
            Some(firewall) => firewall,
            None => {
                let firewall = cluster.firewall_from_template()?;
                let created = self
                    .store
                    .create_firewall(&firewall)
                    .await
                    .map_err(ControllerError::store("creating the owned XFirewall"))?;
                info!("Created XFirewall {} from the XCluster template", key);
                created
            }
        };

        if !firewall.is_ready() {
            if cluster.is_ready() {
                cluster.status = Some(XClusterStatus { ready: false });
                self.store
                    .update_cluster_status(&cluster)
                    .await
                    .map_err(ControllerError::store("withdrawing XCluster readiness"))?;
                warn!("XFirewall {} is no longer ready, withdrew XCluster readiness", key);
            } else {
                debug!("XFirewall {} not ready yet", key);
            }
            return Ok(self.requeue());
        }

        if !cluster.is_ready() {
            cluster.status = Some(XClusterStatus { ready: true });
            self.store
                .update_cluster_status(&cluster)
                .await
                .map_err(ControllerError::store("updating XCluster status"))?;
            info!("XCluster {} is ready", key);
        }

        Ok(ReconcileOutcome::Converged)
    }

    async fn allocate_private_network(
        &self,
        key: &ObjectKey,
        mut cluster: XCluster,
    ) -> Result<XCluster, ControllerError> {
        let request = NetworkAllocateRequest {
            name: cluster.spec.partition.clone(),
            description: format!("private network of xcluster {}", key),
            partition_id: cluster.spec.partition.clone(),
            project_id: cluster.spec.project_id.clone(),
        };
        let network = self
            .metal_client
            .network_allocate(&request)
            .await
            .map_err(ControllerError::metal("allocating the private network"))?;

        cluster.spec.private_network_id = network.id.clone();
        let cluster = self
            .store
            .update_cluster(&cluster)
            .await
            .map_err(ControllerError::store("recording the private network"))?;
        info!(
            "Allocated private network {} for XCluster {} in partition {}",
            network.id, key, cluster.spec.partition
        );
        Ok(cluster)
    }

    /// Deletion path: owned firewall first, then the private network, then the
    /// finalizer.
    async fn finalize_cluster(
        &self,
        key: &ObjectKey,
        mut cluster: XCluster,
    ) -> Result<ReconcileOutcome, ControllerError> {
        if !cluster.has_finalizer(XCLUSTER_FINALIZER) {
            debug!("XCluster {} is being deleted and holds no finalizer of ours", key);
            return Ok(ReconcileOutcome::Converged);
        }

        match self
            .store
            .delete_firewall(key)
            .await
            .map_err(ControllerError::store("deleting the owned XFirewall"))?
        {
            Deletion::Pending => {
                info!("Waiting for XFirewall {} to finish its teardown", key);
                return Ok(self.requeue());
            }
            Deletion::Gone => debug!("XFirewall {} is gone", key),
        }

        if cluster.spec.private_network_id.is_empty() {
            debug!("XCluster {} never recorded a private network", key);
        } else if !self.free_private_network(key, &cluster).await? {
            return Ok(self.requeue());
        }

        cluster.remove_finalizer(XCLUSTER_FINALIZER);
        self.store
            .update_cluster(&cluster)
            .await
            .map_err(ControllerError::store("removing the XCluster finalizer"))?;
        info!("Removed finalizer from XCluster {}", key);

        Ok(ReconcileOutcome::Converged)
    }

    /// Frees the cluster's private network. Returns `false` when freeing failed
    /// and the pass should be retried later.
    async fn free_private_network(&self, key: &ObjectKey, cluster: &XCluster) -> Result<bool, ControllerError> {
        let query = NetworkFindRequest {
            id: Some(cluster.spec.private_network_id.clone()),
            name: Some(cluster.spec.partition.clone()),
            project_id: Some(cluster.spec.project_id.clone()),
            ..Default::default()
        };
        let networks = self
            .metal_client
            .network_find(&query)
            .await
            .map_err(ControllerError::metal("looking up the private network"))?;

        match networks.as_slice() {
            [] => {
                debug!("Private network {} of XCluster {} already freed", cluster.spec.private_network_id, key);
                Ok(true)
            }
            [network] => match self.metal_client.network_free(&network.id).await {
                Ok(()) => {
                    info!("Freed private network {} of XCluster {}", network.id, key);
                    Ok(true)
                }
                Err(e) => {
                    warn!("Failed to free private network {} of XCluster {}, will retry: {}", network.id, key, e);
                    Ok(false)
                }
            },
            many => Err(ControllerError::InconsistentNetworks {
                cluster: key.to_string(),
                network_ids: many.iter().map(|n| n.id.clone()).collect(),
            }),
        }
    }
}

