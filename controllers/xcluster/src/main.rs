//! XCluster Controller
//!
//! Converges XCluster resources onto metal-stack infrastructure:
//! - XCluster: allocates the cluster's private network and owns its XFirewall
//! - XFirewall: provisions the physical firewall machine on the private and
//!   default networks
//!
//! Deletion tears the firewall machine down before the private network is freed.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest may each enable a different rustls backend.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting XCluster Controller");

    // Load configuration from environment variables
    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  metal-api URL: {}", config.metal_url);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Requeue after: {:?}", config.requeue_after);
    info!("  Concurrency: {}", config.concurrency);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await
}
