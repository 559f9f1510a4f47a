//! Reconciliation logic for XCluster and XFirewall resources.
//!
//! - `cluster`: private network allocation, owned XFirewall, readiness mirroring
//! - `firewall`: firewall machine provisioning and teardown
//!
//! Every pass re-fetches the resource it was dispatched for and is safe to
//! repeat at any point.

pub mod cluster;
pub mod firewall;


use crate::backoff::FibonacciBackoff;
use crate::store::ResourceStore;
use kube_runtime::controller::Action;
use metal_client::MetalClientTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// How a pass ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Desired state reached; wait for the next change.
    Converged,
    /// Not there yet; look again after the given delay.
    Requeue(Duration),
}

impl ReconcileOutcome {
    pub fn into_action(self) -> Action {
        match self {
            ReconcileOutcome::Converged => Action::await_change(),
            ReconcileOutcome::Requeue(after) => Action::requeue(after),
        }
    }
}

/// Timing knobs of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Delay of the requeue signal while waiting for readiness or teardown
    pub requeue_after: Duration,
    pub retry_min: Duration,
    pub retry_max: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            requeue_after: Duration::from_secs(10),
            retry_min: Duration::from_secs(5),
            retry_max: Duration::from_secs(300),
        }
    }
}

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(settings: &ReconcilerSettings) -> Self {
        Self {
            backoff: FibonacciBackoff::new(settings.retry_min, settings.retry_max),
            error_count: 0,
        }
    }
}

/// Reconciles XCluster and XFirewall resources.
pub struct Reconciler {
    pub(crate) store: Box<dyn ResourceStore>,
    pub(crate) metal_client: Box<dyn MetalClientTrait>,
    pub(crate) settings: ReconcilerSettings,
    /// Retry state per resource (kind/namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        store: impl ResourceStore + 'static,
        metal_client: impl MetalClientTrait + 'static,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store: Box::new(store),
            metal_client: Box::new(metal_client),
            settings,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn requeue(&self) -> ReconcileOutcome {
        ReconcileOutcome::Requeue(self.settings.requeue_after)
    }

    /// Records a failed pass for `resource_key` and returns the delay before
    /// the next attempt.
    pub(crate) fn next_retry_delay(&self, resource_key: &str) -> Duration {
        let Ok(mut states) = self.backoff_states.lock() else {
            return self.settings.retry_max;
        };
        let state = states
            .entry(resource_key.to_string())
            .or_insert_with(|| BackoffState::new(&self.settings));
        state.error_count += 1;
        let delay = state.backoff.next_backoff();
        debug!(
            "Resource {} failed {} time(s) in a row, retrying in {:?}",
            resource_key, state.error_count, delay
        );
        delay
    }

    /// Restarts the retry sequence of `resource_key` after a successful pass.
    pub(crate) fn reset_retry_delay(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.backoff.reset();
                state.error_count = 0;
            }
        }
    }

    #[cfg(test)]
    fn error_count(&self, resource_key: &str) -> u32 {
        self.backoff_states
            .lock()
            .unwrap()
            .get(resource_key)
            .map_or(0, |state| state.error_count)
    }
}
