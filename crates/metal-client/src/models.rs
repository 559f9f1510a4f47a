//! metal-api models
//!
//! These models match the metal-api v1 request and response payloads for the
//! network and firewall endpoints. Only the fields the controller reads or
//! sets are modelled; unknown response fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /v1/network/allocate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAllocateRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "partitionid")]
    pub partition_id: String,
    #[serde(rename = "projectid")]
    pub project_id: String,
}

/// Request body for `POST /v1/network/find`
///
/// Every unset field is left out of the query and matches any value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFindRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "partitionid", default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    #[serde(rename = "projectid", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl NetworkFindRequest {
    /// Whether `network` satisfies every set field of the query.
    pub fn matches(&self, network: &Network) -> bool {
        fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
            wanted.as_ref().is_none_or(|w| actual.as_ref() == Some(w))
        }

        self.id.as_ref().is_none_or(|id| *id == network.id)
            && field_matches(&self.name, &network.name)
            && field_matches(&self.partition_id, &network.partition_id)
            && field_matches(&self.project_id, &network.project_id)
    }
}

/// Network as returned by the metal-api
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "partitionid", default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    #[serde(rename = "projectid", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// Network a machine is attached to at allocation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAllocationNetwork {
    #[serde(rename = "networkid")]
    pub network_id: String,
    #[serde(rename = "autoacquire")]
    pub auto_acquire: bool,
}

impl MachineAllocationNetwork {
    /// Attaches every given network with automatic IP acquisition.
    pub fn auto_acquire<I, S>(network_ids: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        network_ids
            .into_iter()
            .map(|id| Self {
                network_id: id.into(),
                auto_acquire: true,
            })
            .collect()
    }
}

/// Request body for `POST /v1/firewall`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallCreateRequest {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "sizeid")]
    pub size_id: String,
    #[serde(rename = "partitionid")]
    pub partition_id: String,
    #[serde(rename = "projectid")]
    pub project_id: String,
    #[serde(rename = "imageid")]
    pub image_id: String,
    pub networks: Vec<MachineAllocationNetwork>,
    #[serde(default)]
    pub ssh_pub_keys: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Allocation block of a machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAllocation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Firewall machine as returned by the metal-api
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<MachineAllocation>,
}

impl Firewall {
    /// Whether the backend finished allocating the machine.
    pub fn allocation_succeeded(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.succeeded)
    }
}
