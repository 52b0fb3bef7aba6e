//! Bootstrap, rebuild, and teardown commands.
//!
//! These run on the remote side without any membership checks; the
//! [`crate::orchestrator::ClusterOrchestrator`] layers the topology guards
//! and registry bookkeeping on top.

use super::ClusterClient;
use crate::error::ClusterError;
use crate::operation::{
    DeleteMaster, DeleteWorker, InstallFirstMaster, InstallLoadBalancer, JoinMaster, JoinWorker,
    RebuildFirstMaster, RebuildHa, RebuildMaster, RebuildWorker, RemoveNode,
};
use crate::result::CommandResult;
use crate::transport::Transport;

impl<T: Transport> ClusterClient<T> {
    /// Installs the control-plane load balancer.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn install_load_balancer(
        &self,
        request: InstallLoadBalancer,
    ) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Bootstraps the first control-plane node. A second call against a
    /// bootstrapped cluster is reported by the backend as a domain error.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn install_first_master(
        &self,
        request: InstallFirstMaster,
    ) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Joins an additional master through `request.main_id`.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn join_master(&self, request: JoinMaster) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Joins a worker through `request.main_id`.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn join_worker(&self, request: JoinWorker) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Rebuilds the first master in place.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn rebuild_first_master(
        &self,
        request: InstallFirstMaster,
    ) -> Result<CommandResult, ClusterError> {
        self.call(RebuildFirstMaster(request)).await
    }

    /// Rebuilds a joined master.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn rebuild_master(&self, request: JoinMaster) -> Result<CommandResult, ClusterError> {
        self.call(RebuildMaster(request)).await
    }

    /// Rebuilds a worker.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn rebuild_worker(&self, request: JoinWorker) -> Result<CommandResult, ClusterError> {
        self.call(RebuildWorker(request)).await
    }

    /// Repairs load balancer routing to the control plane.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn rebuild_ha(
        &self,
        request: InstallLoadBalancer,
    ) -> Result<CommandResult, ClusterError> {
        self.call(RebuildHa(request)).await
    }

    /// Removes a control-plane node.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_master(&self, request: DeleteMaster) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Drains and removes a worker.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_worker(&self, request: DeleteWorker) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }

    /// Removes a node by name without role-specific cleanup.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn remove_node(&self, request: RemoveNode) -> Result<CommandResult, ClusterError> {
        self.call(request).await
    }
}
