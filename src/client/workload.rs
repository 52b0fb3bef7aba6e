//! Namespace and pod operations.

use super::ClusterClient;
use crate::error::ClusterError;
use crate::operation::{
    DeleteNamespace, DeletePod, DeployKubernetes, GetNamespaceStatus, GetPodLogs, GetPodStatus,
    NamespaceRef, NamespaceStatus, PodLogs, PodRef, PodStatus, RestartPod,
};
use crate::result::CommandResult;
use crate::transport::Transport;

impl<T: Transport> ClusterClient<T> {
    /// Reads a namespace and its pods.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn get_namespace_status(
        &self,
        namespace: NamespaceRef,
    ) -> Result<NamespaceStatus, ClusterError> {
        self.call(GetNamespaceStatus(namespace)).await
    }

    /// Deletes a namespace and everything in it.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_namespace(
        &self,
        namespace: NamespaceRef,
    ) -> Result<CommandResult, ClusterError> {
        self.call(DeleteNamespace(namespace)).await
    }

    /// Reads one pod.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn get_pod_status(&self, pod: PodRef) -> Result<PodStatus, ClusterError> {
        self.call(GetPodStatus(pod)).await
    }

    /// Restarts one pod.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn restart_pod(&self, pod: PodRef) -> Result<CommandResult, ClusterError> {
        self.call(RestartPod(pod)).await
    }

    /// Deletes one pod.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_pod(&self, pod: PodRef) -> Result<CommandResult, ClusterError> {
        self.call(DeletePod(pod)).await
    }

    /// Fetches pod logs. A pod that no longer exists is not an error; check
    /// [`PodLogs::body`].
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn get_pod_logs(&self, request: GetPodLogs) -> Result<PodLogs, ClusterError> {
        self.call(request).await
    }

    /// Runs the build-and-deploy job.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Validation`] when any git or registry
    /// credential is blank, otherwise see [`ClusterClient::call`].
    pub async fn deploy_kubernetes(
        &self,
        request: DeployKubernetes,
    ) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }
}
