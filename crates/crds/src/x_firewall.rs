//! XFirewall CRD
//!
//! Desired and observed state of one physical firewall machine. An XFirewall
//! always shares its namespace and name with the XCluster that owns it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer guarding the teardown of the physical firewall machine.
pub const XFIREWALL_FINALIZER: &str = "xfirewall.finalizers.cluster.www.x-cellent.com";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.www.x-cellent.com",
    version = "v1",
    kind = "XFirewall",
    namespaced,
    status = "XFirewallStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Machine", "type":"string", "jsonPath":".spec.machineID"}"#
)]
pub struct XFirewallSpec {
    /// Network the firewall uplinks to (usually the internet network)
    #[serde(rename = "defaultNetworkID", default, skip_serializing_if = "String::is_empty")]
    pub default_network_id: String,

    /// Machine image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// ID of the provisioned machine. Empty until the machine is created.
    #[serde(rename = "machineID", default, skip_serializing_if = "String::is_empty")]
    pub machine_id: String,

    /// Machine size class
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct XFirewallStatus {
    /// Whether the backend reports the machine allocation as succeeded
    #[serde(default)]
    pub ready: bool,
}

impl XFirewall {
    /// Whether the firewall has reported ready.
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    /// Hostname given to the physical machine.
    pub fn hostname(&self) -> String {
        format!("{}-firewall", self.metadata.name.as_deref().unwrap_or_default())
    }
}
