//! XFirewall reconciliation.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crds::{Lifecycle, ObjectKey, XFirewall, XFirewallStatus, XFIREWALL_FINALIZER};
use metal_client::{FirewallCreateRequest, MachineAllocationNetwork};
use tracing::{debug, info};

impl Reconciler {
    /// Runs one reconciliation pass for the XFirewall identified by `key`.
    ///
    /// Creates the firewall machine once, mirrors its allocation state into
    /// `status.ready` and requeues until it is ready. On deletion the machine
    /// is freed before the finalizer is released.
    pub async fn reconcile_firewall(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let Some(mut firewall) = self
            .store
            .get_firewall(key)
            .await
            .map_err(ControllerError::store("fetching the XFirewall"))?
        else {
            debug!("XFirewall {} no longer exists, nothing to do", key);
            return Ok(ReconcileOutcome::Converged);
        };

        if firewall.is_being_deleted() {
            return self.finalize_firewall(key, firewall).await;
        }

        if firewall.add_finalizer(XFIREWALL_FINALIZER) {
            firewall = self
                .store
                .update_firewall(&firewall)
                .await
                .map_err(ControllerError::store("adding the XFirewall finalizer"))?;
            info!("Added finalizer to XFirewall {}", key);
        }

        if firewall.spec.machine_id.is_empty() {
            firewall = self.create_machine(key, firewall).await?;
        }

        let machine = self
            .metal_client
            .firewall_get(&firewall.spec.machine_id)
            .await
            .map_err(ControllerError::metal("fetching the firewall machine"))?;
        let ready = machine.allocation_succeeded();

        if firewall.is_ready() != ready {
            firewall.status = Some(XFirewallStatus { ready });
            self.store
                .update_firewall_status(&firewall)
                .await
                .map_err(ControllerError::store("updating XFirewall status"))?;
            info!("XFirewall {} ready: {}", key, ready);
        }

        if !ready {
            debug!("Firewall machine {} of XFirewall {} not allocated yet", firewall.spec.machine_id, key);
            return Ok(self.requeue());
        }
        Ok(ReconcileOutcome::Converged)
    }

    async fn create_machine(
        &self,
        key: &ObjectKey,
        mut firewall: XFirewall,
    ) -> Result<XFirewall, ControllerError> {
        // The owning cluster shares the firewall's identity.
        let cluster = self
            .store
            .get_cluster(key)
            .await
            .map_err(ControllerError::store("fetching the owning XCluster"))?
            .ok_or_else(|| ControllerError::ClusterUnavailable(format!("XCluster {} not found", key)))?;
        if cluster.is_being_deleted() {
            return Err(ControllerError::ClusterUnavailable(format!(
                "XCluster {} is being deleted",
                key
            )));
        }
        if cluster.spec.private_network_id.is_empty() {
            return Err(ControllerError::ClusterUnavailable(format!(
                "XCluster {} has no private network yet",
                key
            )));
        }

        let networks = [
            firewall.spec.default_network_id.as_str(),
            cluster.spec.private_network_id.as_str(),
        ];
        let request = FirewallCreateRequest {
            name: key.name.clone(),
            hostname: firewall.hostname(),
            description: format!("firewall of xcluster {}", key),
            size_id: firewall.spec.size.clone(),
            partition_id: cluster.spec.partition.clone(),
            project_id: cluster.spec.project_id.clone(),
            image_id: firewall.spec.image.clone(),
            networks: MachineAllocationNetwork::auto_acquire(networks.into_iter().filter(|id| !id.is_empty())),
            ..Default::default()
        };
        let machine = self
            .metal_client
            .firewall_create(&request)
            .await
            .map_err(ControllerError::metal("creating the firewall machine"))?;

        firewall.spec.machine_id = machine.id.clone();
        let firewall = self
            .store
            .update_firewall(&firewall)
            .await
            .map_err(ControllerError::store("recording the firewall machine"))?;
        info!("Created firewall machine {} for XFirewall {}", machine.id, key);
        Ok(firewall)
    }

    async fn finalize_firewall(
        &self,
        key: &ObjectKey,
        mut firewall: XFirewall,
    ) -> Result<ReconcileOutcome, ControllerError> {
        if !firewall.has_finalizer(XFIREWALL_FINALIZER) {
            debug!("XFirewall {} is being deleted and holds no finalizer of ours", key);
            return Ok(ReconcileOutcome::Converged);
        }

        if firewall.spec.machine_id.is_empty() {
            debug!("XFirewall {} never recorded a machine", key);
        } else {
            self.metal_client
                .machine_delete(&firewall.spec.machine_id)
                .await
                .map_err(ControllerError::metal("freeing the firewall machine"))?;
            info!("Freed firewall machine {} of XFirewall {}", firewall.spec.machine_id, key);
        }

        firewall.remove_finalizer(XFIREWALL_FINALIZER);
        self.store
            .update_firewall(&firewall)
            .await
            .map_err(ControllerError::store("removing the XFirewall finalizer"))?;
        info!("Removed finalizer from XFirewall {}", key);

        Ok(ReconcileOutcome::Converged)
    }
}
