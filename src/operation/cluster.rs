//! Requests that create, repair, or dismantle cluster topology.

use serde::{Deserialize, Serialize};

use super::Validate;
use crate::credential::Credential;
use crate::error::ValidationError;
use crate::hops::HopChain;

fn require_credential(credential: &Credential, field: &str) -> Result<(), ValidationError> {
    if credential.is_blank() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Checks an optional hop chain and its credential travel together.
fn require_paired(
    hops: Option<&HopChain>,
    hops_field: &str,
    password: Option<&Credential>,
    password_field: &str,
) -> Result<(), ValidationError> {
    HopChain::require_optional(hops, hops_field)?;
    match (hops, password) {
        (Some(_), None) => Err(ValidationError::new(
            password_field,
            format!("is required when {hops_field} is set"),
        )),
        (_, Some(password)) => require_credential(password, password_field),
        (None, None) => Ok(()),
    }
}

/// Installs the load balancer that fronts an HA control plane.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallLoadBalancer {
    /// Registry id of the load balancer node.
    pub server_id: String,
    /// Owning infra.
    pub infra_id: String,
    /// Route to the load balancer.
    pub hops: HopChain,
}

impl Validate for InstallLoadBalancer {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        ValidationError::require(&self.infra_id, "infraId")?;
        self.hops.require("hops")
    }
}

/// Bootstraps the first control-plane node of a cluster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallFirstMaster {
    /// Registry id of the new master.
    pub server_id: String,
    /// Owning infra.
    pub infra_id: String,
    /// Route to the new master.
    pub hops: HopChain,
    /// Route to the load balancer in HA topologies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_hops: Option<HopChain>,
    /// Privileged password on the new master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Credential>,
    /// Privileged password on the load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_password: Option<Credential>,
}

impl Validate for InstallFirstMaster {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        ValidationError::require(&self.infra_id, "infraId")?;
        self.hops.require("hops")?;
        if let Some(password) = &self.password {
            require_credential(password, "password")?;
        }
        require_paired(
            self.lb_hops.as_ref(),
            "lbHops",
            self.lb_password.as_ref(),
            "lbPassword",
        )
    }
}

/// Joins an additional control-plane node through an existing master.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMaster {
    /// Registry id of the joining master.
    pub server_id: String,
    /// Owning infra.
    pub infra_id: String,
    /// Route to the joining master.
    pub hops: HopChain,
    /// Route to the load balancer.
    pub lb_hops: HopChain,
    /// Privileged password on the joining master.
    pub password: Credential,
    /// Privileged password on the load balancer.
    pub lb_password: Credential,
    /// Registry id of a healthy master that supplies join material.
    pub main_id: String,
}

impl Validate for JoinMaster {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        ValidationError::require(&self.infra_id, "infraId")?;
        self.hops.require("hops")?;
        self.lb_hops.require("lbHops")?;
        require_credential(&self.password, "password")?;
        require_credential(&self.lb_password, "lbPassword")
    }
}

/// Joins a worker node through an existing master.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWorker {
    /// Registry id of the joining worker.
    pub server_id: String,
    /// Route to the joining worker.
    pub hops: HopChain,
    /// Privileged password on the worker.
    pub password: Credential,
    /// Registry id of a healthy master that supplies the join token.
    pub main_id: String,
}

impl Validate for JoinWorker {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        require_credential(&self.password, "password")
    }
}

/// Rebuilds a failed first master; same payload as [`InstallFirstMaster`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RebuildFirstMaster(pub InstallFirstMaster);

impl Validate for RebuildFirstMaster {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Rebuilds a failed joined master; same payload as [`JoinMaster`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RebuildMaster(pub JoinMaster);

impl Validate for RebuildMaster {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Rebuilds a failed worker; same payload as [`JoinWorker`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RebuildWorker(pub JoinWorker);

impl Validate for RebuildWorker {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Repairs load balancer routing; same payload as [`InstallLoadBalancer`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RebuildHa(pub InstallLoadBalancer);

impl Validate for RebuildHa {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Removes a control-plane node, updating the balancer and the surviving
/// control plane when their routes are supplied.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMaster {
    /// Registry id of the master being removed.
    pub server_id: String,
    /// Privileged password on the master being removed.
    pub password: Credential,
    /// Route to the master being removed.
    pub hops: HopChain,
    /// Route to the load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_hops: Option<HopChain>,
    /// Privileged password on the load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_password: Option<Credential>,
    /// Route to a surviving master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_hops: Option<HopChain>,
    /// Privileged password on the surviving master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_password: Option<Credential>,
}

impl Validate for DeleteMaster {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        require_credential(&self.password, "password")?;
        self.hops.require("hops")?;
        require_paired(
            self.lb_hops.as_ref(),
            "lbHops",
            self.lb_password.as_ref(),
            "lbPassword",
        )?;
        require_paired(
            self.main_hops.as_ref(),
            "mainHops",
            self.main_password.as_ref(),
            "mainPassword",
        )
    }
}

/// Drains and removes a worker through a surviving master.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorker {
    /// Registry id of the worker being removed.
    pub server_id: String,
    /// Registry id of the surviving master.
    pub main_id: String,
    /// Privileged password on the worker.
    pub password: Credential,
    /// Privileged password on the surviving master.
    pub main_password: Credential,
    /// Route to the worker.
    pub hops: HopChain,
    /// Route to the surviving master.
    pub main_hops: HopChain,
}

impl Validate for DeleteWorker {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        require_credential(&self.password, "password")?;
        require_credential(&self.main_password, "mainPassword")?;
        self.hops.require("hops")?;
        self.main_hops.require("mainHops")
    }
}

/// Removes a node by Kubernetes node name, without role-specific cleanup.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveNode {
    /// Registry id of the master the removal runs on.
    pub server_id: String,
    /// Route to that master.
    pub hops: HopChain,
    /// Kubernetes node name to remove.
    pub node_name: String,
}

impl Validate for RemoveNode {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        ValidationError::require(&self.node_name, "nodeName")
    }
}
