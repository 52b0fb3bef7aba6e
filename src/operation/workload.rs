//! Namespace and pod scoped requests for a working cluster.

use serde::{Deserialize, Serialize};

use super::Validate;
use crate::credential::Credential;
use crate::error::ValidationError;
use crate::hops::HopChain;

fn require_secret(credential: &Credential, field: &str) -> Result<(), ValidationError> {
    if credential.is_blank() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Addresses a namespace through a master.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRef {
    /// Registry id of the master the call runs on.
    pub server_id: String,
    /// Route to that master.
    pub hops: HopChain,
    /// Namespace name.
    pub namespace: String,
}

impl Validate for NamespaceRef {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        ValidationError::require(&self.namespace, "namespace")
    }
}

/// Addresses a pod through a master.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRef {
    /// Registry id of the master the call runs on.
    pub server_id: String,
    /// Route to that master.
    pub hops: HopChain,
    /// Namespace of the pod.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
}

impl Validate for PodRef {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        ValidationError::require(&self.namespace, "namespace")?;
        ValidationError::require(&self.pod_name, "podName")
    }
}

/// Reads a namespace and the pods inside it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GetNamespaceStatus(pub NamespaceRef);

/// Deletes a namespace and everything in it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeleteNamespace(pub NamespaceRef);

/// Reads one pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GetPodStatus(pub PodRef);

/// Restarts one pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RestartPod(pub PodRef);

/// Deletes one pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeletePod(pub PodRef);

impl Validate for GetNamespaceStatus {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

impl Validate for DeleteNamespace {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

impl Validate for GetPodStatus {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

impl Validate for RestartPod {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

impl Validate for DeletePod {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Fetches the logs of a pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPodLogs {
    /// Registry id of the master the call runs on.
    pub server_id: String,
    /// Route to that master.
    pub hops: HopChain,
    /// Namespace of the pod.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Limit to the last N lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<u32>,
}

impl Validate for GetPodLogs {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        ValidationError::require(&self.namespace, "namespace")?;
        ValidationError::require(&self.pod_name, "podName")
    }
}

/// Source repository credentials for a deployment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCredentials {
    /// Clone URL.
    pub repository_url: String,
    /// Branch to build; the backend default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Git user.
    pub username: String,
    /// Git token or password.
    pub token: Credential,
}

/// Container registry credentials for a deployment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    /// Registry URL.
    pub url: String,
    /// Registry user.
    pub username: String,
    /// Registry password.
    pub password: Credential,
}

/// Builds and deploys a workload; a black-box remote job.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployKubernetes {
    /// Registry id of the master the job runs on.
    pub server_id: String,
    /// Route to that master.
    pub hops: HopChain,
    /// Target namespace; the backend default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Source repository credentials.
    pub git: GitCredentials,
    /// Container registry credentials.
    pub registry: RegistryCredentials,
}

impl Validate for DeployKubernetes {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.server_id, "serverId")?;
        self.hops.require("hops")?;
        ValidationError::require(&self.git.repository_url, "git.repositoryUrl")?;
        ValidationError::require(&self.git.username, "git.username")?;
        require_secret(&self.git.token, "git.token")?;
        ValidationError::require(&self.registry.url, "registry.url")?;
        ValidationError::require(&self.registry.username, "registry.username")?;
        require_secret(&self.registry.password, "registry.password")
    }
}

/// State of one pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    /// Pod name.
    pub name: String,
    /// Namespace of the pod.
    pub namespace: String,
    /// Pod phase such as `Running`.
    pub phase: String,
    /// Whether all containers are ready.
    #[serde(default)]
    pub ready: bool,
    /// Container restart count.
    #[serde(default)]
    pub restarts: u32,
    /// Node the pod is scheduled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// State of a namespace and its pods.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStatus {
    /// Namespace name.
    pub name: String,
    /// Namespace phase such as `Active`.
    pub phase: String,
    /// Pods in the namespace.
    #[serde(default)]
    pub pods: Vec<PodStatus>,
}

/// Result of `getPodLogs`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodLogs {
    /// Whether the pod still existed when the logs were fetched.
    pub pod_exists: bool,
    /// Log body; empty when the pod is gone.
    #[serde(default)]
    pub logs: String,
}

impl PodLogs {
    /// The log body, or `None` when the pod no longer exists. An empty body
    /// for an existing pod is `Some("")`.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.pod_exists.then_some(self.logs.as_str())
    }
}
