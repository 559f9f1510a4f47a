//! metal-api REST Client
//!
//! A Rust client for the parts of the metal-stack metal-api that provision a
//! cluster's network edge: private networks and firewall machines.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::{MetalClient, MetalClientTrait, NetworkAllocateRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetalClient::new(
//!     "https://metal.example.com/metal".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let network = client
//!     .network_allocate(&NetworkAllocateRequest {
//!         name: "fra-equ01".to_string(),
//!         partition_id: "fra-equ01".to_string(),
//!         project_id: "my-project".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("allocated {}", network.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod metal_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::MetalClient;
pub use error::MetalError;
pub use models::*;
pub use metal_trait::MetalClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockMetalClient, Operation};
