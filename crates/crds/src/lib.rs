//! XCluster CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the XCluster controller and the
//! lifecycle helpers shared by their reconcilers.

pub mod error;
pub mod lifecycle;
pub mod x_cluster;
pub mod x_firewall;

pub use error::CrdError;
pub use lifecycle::{Lifecycle, ObjectKey};
pub use x_cluster::*;
pub use x_firewall::*;
