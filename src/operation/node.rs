//! Requests and payloads for nodes that already belong to a cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Validate;
use crate::error::ValidationError;
use crate::hops::HopChain;

/// Addresses one node for status and power operations.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTarget {
    /// Registry id of the node.
    pub server_id: String,
    /// Owning infra, when the backend needs it to scope the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_id: Option<String>,
    /// Route to the node.
    pub hops: HopChain,
}

impl NodeTarget {
    /// Targets `server_id` through `hops`.
    #[must_use]
    pub fn new(server_id: impl Into<String>, hops: HopChain) -> Self {
        Self {
            server_id: server_id.into(),
            infra_id: None,
            hops,
        }
    }

    /// Scopes the call to an infra.
    #[must_use]
    pub fn in_infra(mut self, infra_id: impl Into<String>) -> Self {
        self.infra_id = Some(infra_id.into());
        self
    }
}

impl Validate for NodeTarget {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")
    }
}

macro_rules! node_request {
    ($( $(#[$doc:meta])* $name:ident; )+) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
            #[serde(transparent)]
            pub struct $name(pub NodeTarget);

            impl Validate for $name {
                fn validate(&self) -> Result<(), ValidationError> {
                    self.0.validate()
                }
            }

            impl From<NodeTarget> for $name {
                fn from(value: NodeTarget) -> Self {
                    Self(value)
                }
            }
        )+
    };
}

node_request! {
    /// Reads one node's status. Never mutates the cluster.
    GetNodeStatus;
    /// Enumerates live cluster members as seen from the addressed master.
    CalculateNodes;
    /// Reads aggregate cluster capacity and utilisation.
    CalculateResources;
    /// Renews control-plane certificates on the addressed master.
    RenewCertificate;
    /// Powers the machine on.
    StartServer;
    /// Powers the machine off.
    StopServer;
    /// Power-cycles the machine as one remote operation.
    RestartServer;
}

/// Health reported for a node.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeHealth {
    /// Kubernetes reports the node Ready.
    #[serde(alias = "Ready", alias = "healthy", alias = "active")]
    Ready,
    /// Kubernetes reports the node NotReady.
    #[serde(alias = "NotReady", alias = "notready", alias = "unhealthy")]
    NotReady,
    /// The node could not be reached over its hop chain.
    #[serde(alias = "offline")]
    Unreachable,
    /// Anything else.
    #[default]
    #[serde(other)]
    Unknown,
}

impl NodeHealth {
    /// Whether the node can serve as a healthy cluster member.
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Result of `getNodeStatus`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// Reported health.
    pub status: NodeHealth,
    /// When the backend performed the check.
    pub last_checked: DateTime<Utc>,
    /// Additional detail from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One live cluster member as reported by `calculateNodes`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    /// Kubernetes node name.
    pub name: String,
    /// Node condition.
    pub status: NodeHealth,
    /// Node roles, for example `control-plane`.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Age as printed by the cluster, for example `3d4h`.
    #[serde(default)]
    pub age: String,
    /// Kubelet version.
    #[serde(default)]
    pub version: String,
    /// Internal address of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
}

impl ClusterNode {
    /// Whether the node carries a control-plane role.
    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.roles
            .iter()
            .any(|role| matches!(role.as_str(), "control-plane" | "master"))
    }
}

/// Capacity and usage of one resource.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Allocatable amount.
    pub capacity: u64,
    /// Amount in use.
    pub used: u64,
}

impl ResourceUsage {
    /// Usage as a whole percentage of capacity, `None` without capacity.
    #[must_use]
    pub const fn utilisation_percent(self) -> Option<u64> {
        self.used.saturating_mul(100).checked_div(self.capacity)
    }

    /// Capacity left over.
    #[must_use]
    pub const fn available(self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }
}

/// Result of `calculateResources`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResources {
    /// Number of nodes counted.
    pub nodes: u32,
    /// CPU in millicores.
    pub cpu: ResourceUsage,
    /// Memory in bytes.
    pub memory: ResourceUsage,
    /// Pod slots.
    pub pods: ResourceUsage,
}
