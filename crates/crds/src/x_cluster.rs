//! XCluster CRD
//!
//! Declares the network-level infrastructure of a cluster: the partition and
//! project it lives in, its private network, and the template of the firewall
//! that guards it.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::CrdError;
use crate::x_firewall::{XFirewall, XFirewallSpec};

/// Finalizer guarding the release of the cluster's private network.
pub const XCLUSTER_FINALIZER: &str = "xcluster.finalizers.cluster.www.x-cellent.com";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.www.x-cellent.com",
    version = "v1",
    kind = "XCluster",
    namespaced,
    status = "XClusterStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Network", "type":"string", "jsonPath":".spec.privateNetworkID"}"#
)]
pub struct XClusterSpec {
    /// Physical location where the cluster is created
    pub partition: String,

    /// Project the cluster's machines and networks are billed to
    #[serde(rename = "projectID")]
    pub project_id: String,

    /// Private network of the cluster. Empty until allocated.
    #[serde(rename = "privateNetworkID", default, skip_serializing_if = "String::is_empty")]
    pub private_network_id: String,

    /// Template stamped onto the owned XFirewall
    #[serde(rename = "xFirewallTemplate", default)]
    pub x_firewall_template: XFirewallTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct XFirewallTemplate {
    #[serde(default)]
    pub metadata: TemplateMeta,

    #[serde(default)]
    pub spec: XFirewallSpec,
}

/// Metadata carried over from the template. Name and namespace always come
/// from the owning XCluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct XClusterStatus {
    /// Mirrors the readiness of the owned XFirewall
    #[serde(default)]
    pub ready: bool,
}

impl XCluster {
    /// Whether the cluster has reported ready.
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    /// Builds the XFirewall this cluster owns.
    ///
    /// The firewall gets the cluster's namespace and name, the template's
    /// labels, annotations and spec, and a controller owner reference back to
    /// the cluster so deletion cascades and firewall changes are routed to the
    /// cluster's reconciler.
    pub fn firewall_from_template(&self) -> Result<XFirewall, CrdError> {
        let name = self.metadata.name.clone().ok_or(CrdError::MissingName)?;
        let namespace = self
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| CrdError::MissingNamespace(name.clone()))?;
        let owner = self
            .controller_owner_ref(&())
            .ok_or_else(|| CrdError::MissingUid(format!("{}/{}", namespace, name)))?;

        let template = &self.spec.x_firewall_template;
        let mut spec = template.spec.clone();
        // A template never carries a machine over to a new firewall.
        spec.machine_id.clear();

        Ok(XFirewall {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels: template.metadata.labels.clone(),
                annotations: template.metadata.annotations.clone(),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            spec,
            status: None,
        })
    }
}
