//! Status, capacity, power, and maintenance commands for cluster nodes.

use super::ClusterClient;
use crate::error::ClusterError;
use crate::operation::{
    CalculateNodes, CalculateResources, ClusterNode, ClusterResources, GetNodeStatus, NodeStatus,
    NodeTarget, RenewCertificate, RestartServer, StartServer, StopServer,
};
use crate::result::CommandResult;
use crate::transport::Transport;

impl<T: Transport> ClusterClient<T> {
    /// Reads one node's status. Safe to poll.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn get_node_status(&self, target: NodeTarget) -> Result<NodeStatus, ClusterError> {
        self.call(GetNodeStatus(target)).await
    }

    /// Lists live cluster members as seen from the addressed master.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn calculate_nodes(
        &self,
        target: NodeTarget,
    ) -> Result<Vec<ClusterNode>, ClusterError> {
        self.call(CalculateNodes(target)).await
    }

    /// Reads aggregate capacity and utilisation.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn calculate_resources(
        &self,
        target: NodeTarget,
    ) -> Result<ClusterResources, ClusterError> {
        self.call(CalculateResources(target)).await
    }

    /// Renews control-plane certificates on the addressed master.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn renew_certificate(
        &self,
        target: NodeTarget,
    ) -> Result<CommandResult, ClusterError> {
        self.call(RenewCertificate(target)).await
    }

    /// Powers the machine on.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn start_server(&self, target: NodeTarget) -> Result<CommandResult, ClusterError> {
        self.call(StartServer(target)).await
    }

    /// Powers the machine off.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn stop_server(&self, target: NodeTarget) -> Result<CommandResult, ClusterError> {
        self.call(StopServer(target)).await
    }

    /// Power-cycles the machine. Use [`crate::lifecycle::restart_phases`] to
    /// inspect the stop and start halves of the result.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn restart_server(&self, target: NodeTarget) -> Result<CommandResult, ClusterError> {
        self.call(RestartServer(target)).await
    }
}
