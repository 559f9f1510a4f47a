//! Mock MetalClient for unit testing
//!
//! This module provides an in-memory implementation of MetalClientTrait that
//! can be used in unit tests without a running metal-api. Every call is
//! journaled and any operation can be made to fail on demand.

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// Operations of the provisioning backend, used for failure injection and
/// call journaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NetworkAllocate,
    NetworkFree,
    NetworkFind,
    FirewallCreate,
    FirewallGet,
    MachineDelete,
}

#[derive(Default)]
struct State {
    /// A list rather than a map so tests can model duplicate records.
    networks: Vec<Network>,
    firewalls: BTreeMap<String, Firewall>,
    create_requests: Vec<FirewallCreateRequest>,
    calls: Vec<Operation>,
    failing: HashSet<Operation>,
    allocation_succeeds: bool,
}

/// Mock MetalClient for testing
///
/// Clones share state, so a test can keep a handle while the reconciler owns
/// another.
#[derive(Clone)]
pub struct MockMetalClient {
    base_url: String,
    state: Arc<Mutex<State>>,
}

impl MockMetalClient {
    /// Create a new mock client. Created firewalls report a succeeded
    /// allocation until told otherwise.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Arc::new(Mutex::new(State {
                allocation_succeeds: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make every subsequent call of `operation` fail with an API error
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    /// Undo `fail`
    pub fn recover(&self, operation: Operation) {
        self.state().failing.remove(&operation);
    }

    /// Set the allocation outcome of existing and future firewalls
    pub fn set_allocation_succeeded(&self, succeeded: bool) {
        let mut state = self.state();
        state.allocation_succeeds = succeeded;
        for fw in state.firewalls.values_mut() {
            if let Some(allocation) = fw.allocation.as_mut() {
                allocation.succeeded = succeeded;
            }
        }
    }

    /// Add a network to the mock store (for test setup). Adding the same ID
    /// twice models an inconsistent backend.
    pub fn add_network(&self, network: Network) {
        self.state().networks.push(network);
    }

    /// Add a firewall to the mock store (for test setup)
    pub fn add_firewall(&self, firewall: Firewall) {
        self.state().firewalls.insert(firewall.id.clone(), firewall);
    }

    /// Networks currently allocated
    pub fn networks(&self) -> Vec<Network> {
        self.state().networks.clone()
    }

    /// Firewalls currently existing
    pub fn firewalls(&self) -> Vec<Firewall> {
        self.state().firewalls.values().cloned().collect()
    }

    /// Every firewall create request received, in order
    pub fn create_requests(&self) -> Vec<FirewallCreateRequest> {
        self.state().create_requests.clone()
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<Operation> {
        self.state().calls.clone()
    }

    /// Number of calls received for `operation`
    pub fn call_count(&self, operation: Operation) -> usize {
        self.state().calls.iter().filter(|c| **c == operation).count()
    }

    /// Journals the call and returns the injected failure, if any.
    fn record(&self, operation: Operation) -> Result<std::sync::MutexGuard<'_, State>, MetalError> {
        let mut state = self.state();
        state.calls.push(operation);
        if state.failing.contains(&operation) {
            return Err(MetalError::Api(format!("injected failure for {:?}", operation)));
        }
        Ok(state)
    }

    fn next_id(prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4())
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MockMetalClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn network_allocate(&self, request: &NetworkAllocateRequest) -> Result<Network, MetalError> {
        let mut state = self.record(Operation::NetworkAllocate)?;
        let network = Network {
            id: Self::next_id("net"),
            name: Some(request.name.clone()),
            partition_id: Some(request.partition_id.clone()),
            project_id: Some(request.project_id.clone()),
            prefixes: vec!["10.0.0.0/22".to_string()],
        };
        state.networks.push(network.clone());
        Ok(network)
    }

    async fn network_free(&self, id: &str) -> Result<(), MetalError> {
        let mut state = self.record(Operation::NetworkFree)?;
        let before = state.networks.len();
        state.networks.retain(|n| n.id != id);
        if state.networks.len() == before {
            return Err(MetalError::NotFound(format!("network {}", id)));
        }
        Ok(())
    }

    async fn network_find(&self, request: &NetworkFindRequest) -> Result<Vec<Network>, MetalError> {
        let state = self.record(Operation::NetworkFind)?;
        Ok(state
            .networks
            .iter()
            .filter(|n| request.matches(n))
            .cloned()
            .collect())
    }

    async fn firewall_create(&self, request: &FirewallCreateRequest) -> Result<Firewall, MetalError> {
        let mut state = self.record(Operation::FirewallCreate)?;
        state.create_requests.push(request.clone());
        let firewall = Firewall {
            id: Self::next_id("machine"),
            allocation: Some(MachineAllocation {
                name: request.name.clone(),
                hostname: request.hostname.clone(),
                project: request.project_id.clone(),
                succeeded: state.allocation_succeeds,
                created: Some(chrono::Utc::now()),
            }),
        };
        state.firewalls.insert(firewall.id.clone(), firewall.clone());
        Ok(firewall)
    }

    async fn firewall_get(&self, id: &str) -> Result<Firewall, MetalError> {
        let state = self.record(Operation::FirewallGet)?;
        state
            .firewalls
            .get(id)
            .cloned()
            .ok_or_else(|| MetalError::NotFound(format!("firewall {}", id)))
    }

    async fn machine_delete(&self, id: &str) -> Result<(), MetalError> {
        let mut state = self.record(Operation::MachineDelete)?;
        state.firewalls.remove(id);
        Ok(())
    }
}
