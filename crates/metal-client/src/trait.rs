//! MetalClient trait for mocking
//!
//! This trait abstracts the metal-api client to the provisioning operations
//! the reconcilers need. The concrete MetalClient implements it, and tests use
//! the in-memory MockMetalClient.

use crate::error::MetalError;
use crate::models::*;

/// Trait for metal-api provisioning operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetalClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    // Network Operations
    async fn network_allocate(&self, request: &NetworkAllocateRequest) -> Result<Network, MetalError>;
    async fn network_free(&self, id: &str) -> Result<(), MetalError>;
    async fn network_find(&self, request: &NetworkFindRequest) -> Result<Vec<Network>, MetalError>;

    // Machine Operations
    async fn firewall_create(&self, request: &FirewallCreateRequest) -> Result<Firewall, MetalError>;
    async fn firewall_get(&self, id: &str) -> Result<Firewall, MetalError>;
    /// Frees the machine. A machine the backend does not know is not an error.
    async fn machine_delete(&self, id: &str) -> Result<(), MetalError>;
}
