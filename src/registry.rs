//! Inventory records kept by the external registry store.
//!
//! An [`Infra`] groups the [`Server`] records of one cluster or environment.
//! The registry is bookkeeping only: deleting a record never touches the
//! live cluster.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::hops::HopChain;

/// Kind of infrastructure an [`Infra`] describes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InfraKind {
    /// Self-managed Kubernetes cluster bootstrapped by this client.
    Kubernetes,
    /// Bare-metal hosts.
    Baremetal,
    /// Docker hosts.
    Docker,
    /// Cloud provider resources.
    Cloud,
    /// Kubernetes cluster managed elsewhere.
    ExternalKubernetes,
    /// Docker hosts managed elsewhere.
    ExternalDocker,
}

impl InfraKind {
    /// Whether install/join/rebuild/delete operations apply.
    #[must_use]
    pub const fn supports_bootstrap(self) -> bool {
        matches!(self, Self::Kubernetes)
    }

    /// Whether namespace and pod operations apply.
    #[must_use]
    pub const fn supports_workloads(self) -> bool {
        matches!(self, Self::Kubernetes | Self::ExternalKubernetes)
    }

    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Baremetal => "baremetal",
            Self::Docker => "docker",
            Self::Cloud => "cloud",
            Self::ExternalKubernetes => "external_kubernetes",
            Self::ExternalDocker => "external_docker",
        }
    }
}

impl fmt::Display for InfraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named cluster or infrastructure environment.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Infra {
    /// Registry identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Infrastructure kind.
    #[serde(rename = "type")]
    pub kind: InfraKind,
    /// Opaque configuration blob.
    #[serde(default)]
    pub info: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Role of a server inside its infra.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// Kubernetes control-plane node.
    Master,
    /// Kubernetes worker node.
    Worker,
    /// Load balancer fronting the control plane.
    #[serde(alias = "lb", alias = "load_balancer")]
    Loadbalancer,
    /// Docker host.
    Docker,
    /// Bare-metal host.
    Baremetal,
    /// Any role this client does not know about.
    #[serde(other)]
    Other,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Master => "master",
            Self::Worker => "worker",
            Self::Loadbalancer => "loadbalancer",
            Self::Docker => "docker",
            Self::Baremetal => "baremetal",
            Self::Other => "other",
        })
    }
}

/// Last known state of a server as recorded in the registry.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Part of the cluster and reachable.
    Active,
    /// Powered off or intentionally idle.
    Inactive,
    /// Reported unhealthy by the last status check.
    Unhealthy,
    /// Registered but not yet confirmed.
    Pending,
    /// Removed from the cluster; the record is kept for bookkeeping.
    Detached,
    /// Never checked or unknown label.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A node belonging to an [`Infra`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// Registry identifier.
    pub id: String,
    /// Display name; normally the Kubernetes node name.
    pub name: String,
    /// Owning infra.
    pub infra_id: String,
    /// Role of the node.
    #[serde(rename = "type")]
    pub role: ServerRole,
    /// Address of the node as seen from its last hop.
    pub address: String,
    /// SSH port of the node.
    pub port: u16,
    /// Last recorded status.
    #[serde(default)]
    pub status: ServerStatus,
    /// How to reach the node.
    pub hop_chain: HopChain,
    /// Join command produced when the node was bootstrapped as first master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_command: Option<String>,
    /// Control-plane certificate key produced by the first master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Server {
    /// Whether the node carries certificate material of a first master.
    #[must_use]
    pub const fn is_first_master(&self) -> bool {
        matches!(self.role, ServerRole::Master) && self.certificate_key.is_some()
    }
}

/// Payload for `createServer`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDraft {
    /// Identifier chosen by the caller; the backend assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Owning infra.
    pub infra_id: String,
    /// Role of the node.
    #[serde(rename = "type")]
    pub role: ServerRole,
    /// Address of the node.
    pub address: String,
    /// SSH port of the node.
    pub port: u16,
    /// Initial status.
    #[serde(default)]
    pub status: ServerStatus,
    /// How to reach the node.
    pub hop_chain: HopChain,
    /// Join command of a first master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_command: Option<String>,
    /// Certificate key of a first master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key: Option<String>,
}

impl ServerDraft {
    /// Builds a draft for a node reached through `hop_chain`. The address
    /// and port default to the chain's target.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        infra_id: impl Into<String>,
        role: ServerRole,
        hop_chain: HopChain,
    ) -> Self {
        let (address, port) = hop_chain
            .target()
            .map_or_else(|| (String::new(), 0), |hop| (hop.host.clone(), hop.port));
        Self {
            id: None,
            name: name.into(),
            infra_id: infra_id.into(),
            role,
            address,
            port,
            status: ServerStatus::Pending,
            hop_chain,
            join_command: None,
            certificate_key: None,
        }
    }

    /// Validates the fields the registry requires.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is blank or the hop
    /// chain is unusable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.name, "name")?;
        ValidationError::require(&self.infra_id, "infraId")?;
        ValidationError::require(&self.address, "address")?;
        self.hop_chain.require("hopChain")
    }
}

/// Partial update for `updateServer`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServerStatus>,
    /// New address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// New SSH port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Replacement hop chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_chain: Option<HopChain>,
    /// New join command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_command: Option<String>,
    /// New certificate key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key: Option<String>,
}

impl ServerPatch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: ServerStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Applies the patch to a record.
    pub fn apply_to(&self, server: &mut Server) {
        if let Some(name) = &self.name {
            server.name.clone_from(name);
        }
        if let Some(status) = self.status {
            server.status = status;
        }
        if let Some(address) = &self.address {
            server.address.clone_from(address);
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(chain) = &self.hop_chain {
            server.hop_chain = chain.clone();
        }
        if let Some(command) = &self.join_command {
            server.join_command = Some(command.clone());
        }
        if let Some(key) = &self.certificate_key {
            server.certificate_key = Some(key.clone());
        }
    }

    /// Validates fields that are present.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a present field is blank or the
    /// replacement hop chain is unusable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            ValidationError::require(name, "name")?;
        }
        if let Some(address) = &self.address {
            ValidationError::require(address, "address")?;
        }
        HopChain::require_optional(self.hop_chain.as_ref(), "hopChain")
    }
}

/// Role a user holds on one infra.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionRole {
    /// May run every operation including topology changes.
    Admin,
    /// May read and run workload operations.
    Member,
}

impl PermissionRole {
    /// Whether this role satisfies `required`.
    #[must_use]
    pub const fn allows(self, required: Self) -> bool {
        matches!((self, required), (Self::Admin, _) | (Self::Member, Self::Member))
    }
}

impl fmt::Display for PermissionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Member => "member",
        })
    }
}

/// A user's role on an infra.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// User identifier.
    pub user_id: String,
    /// User e-mail.
    pub user_email: String,
    /// Granted role.
    pub role: PermissionRole,
}

/// A user known to the registry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    /// User identifier.
    pub id: String,
    /// E-mail address.
    pub email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
