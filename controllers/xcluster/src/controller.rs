//! Main controller implementation.
//!
//! Wires the Kubernetes client, the metal-api client and the reconciler
//! together and runs the XCluster and XFirewall watchers side by side.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;
use crate::watcher::Watcher;
use crds::{XCluster, XFirewall};
use kube::{Api, Client};
use metal_client::MetalClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for XCluster resource management.
pub struct Controller {
    cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    firewall_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing XCluster Controller");

        let kube_client = Client::try_default().await?;
        let metal_client = MetalClient::new(config.metal_url.clone(), config.metal_token.clone())?;

        let (cluster_api, firewall_api): (Api<XCluster>, Api<XFirewall>) = match config.namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(kube_client.clone(), ns),
                Api::namespaced(kube_client.clone(), ns),
            ),
            None => (Api::all(kube_client.clone()), Api::all(kube_client.clone())),
        };

        let reconciler = Arc::new(Reconciler::new(
            KubeStore::new(kube_client),
            metal_client,
            config.reconciler_settings(),
        ));
        let watcher = Arc::new(Watcher::new(reconciler, cluster_api, firewall_api, config.concurrency));

        let cluster_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_clusters().await })
        };
        let firewall_watcher = tokio::spawn(async move { watcher.watch_firewalls().await });

        Ok(Self {
            cluster_watcher,
            firewall_watcher,
        })
    }

    /// Runs until either watcher stops. Both stop on SIGTERM or Ctrl-C; a
    /// watcher failing or panicking is reported as `ControllerError::Watch`.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("XCluster Controller running");

        let outcome = tokio::select! {
            result = &mut self.cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("XCluster watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("XCluster watcher error: {}", e)))
            }
            result = &mut self.firewall_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("XFirewall watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("XFirewall watcher error: {}", e)))
            }
        };

        self.cluster_watcher.abort();
        self.firewall_watcher.abort();
        info!("XCluster Controller stopped");
        outcome
    }
}
