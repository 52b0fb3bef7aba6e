//! Guarded bootstrap, rebuild, and teardown.
//!
//! Each method resolves the servers involved from the registry, admits the
//! change against the topology book, runs the remote command, and only then
//! updates the book and the registry.

use tracing::info;

use super::{ClusterOrchestrator, NodeSpec, Peer, new_server_id};
use crate::credential::Credential;
use crate::error::ClusterError;
use crate::hops::HopChain;
use crate::operation::{
    DeleteMaster, DeleteWorker, InstallFirstMaster, InstallLoadBalancer, JoinMaster, JoinWorker,
    NodeTarget, RemoveNode,
};
use crate::registry::{PermissionRole, Server, ServerDraft, ServerRole, ServerStatus};
use crate::result::CommandResult;
use crate::topology::TopologyOp;
use crate::transport::Transport;

impl<T: Transport> ClusterOrchestrator<T> {
    /// Installs the load balancer for an HA control plane and registers it.
    ///
    /// # Errors
    ///
    /// Returns a topology error when masters already exist, otherwise the
    /// client or registry error.
    pub async fn install_load_balancer(
        &self,
        infra_id: &str,
        name: &str,
        hops: HopChain,
    ) -> Result<Server, ClusterError> {
        let server_id = new_server_id();
        let op = TopologyOp::InstallLoadBalancer {
            target: server_id.clone(),
        };
        let address = hops.target().map(|hop| hop.host.clone());
        self.admit(infra_id, &op, None, address.as_deref()).await?;

        let mut draft = ServerDraft::new(name, infra_id, ServerRole::Loadbalancer, hops.clone());
        draft.id = Some(server_id.clone());
        let result = self
            .client
            .install_load_balancer(InstallLoadBalancer {
                server_id,
                infra_id: infra_id.to_owned(),
                hops,
            })
            .await
            .map_err(|err| self.note_timeout(err, infra_id, &op, Some(&draft)))?;
        self.commit(infra_id, &op);
        self.register(draft, Some(&result)).await
    }

    /// Bootstraps the first master, optionally behind a load balancer.
    ///
    /// # Errors
    ///
    /// Returns a topology error when the cluster already has a master, a
    /// domain error when the remote bootstrap fails, otherwise the client or
    /// registry error.
    pub async fn install_first_master(
        &self,
        infra_id: &str,
        spec: NodeSpec,
        load_balancer: Option<&Peer>,
    ) -> Result<Server, ClusterError> {
        let server_id = new_server_id();
        let op = TopologyOp::InstallFirstMaster {
            target: server_id.clone(),
        };
        let address = spec.hops.target().map(|hop| hop.host.clone());
        self.admit(infra_id, &op, None, address.as_deref()).await?;
        let lb = self.resolve_optional(load_balancer).await?;

        let draft = spec.draft(&server_id, infra_id, ServerRole::Master);
        let request = InstallFirstMaster {
            server_id,
            infra_id: infra_id.to_owned(),
            hops: spec.hops,
            lb_hops: lb.as_ref().map(|(server, _)| server.hop_chain.clone()),
            password: Some(spec.password),
            lb_password: lb.map(|(_, password)| password),
        };
        let result = self
            .client
            .install_first_master(request)
            .await
            .map_err(|err| self.note_timeout(err, infra_id, &op, Some(&draft)))?;
        self.commit(infra_id, &op);
        self.register(draft, Some(&result)).await
    }

    /// Joins another master using join material from `main_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] when `main_id` is blank
    /// or not a tracked master, a topology error when the main master is
    /// degraded, otherwise the client or registry error.
    pub async fn join_master(
        &self,
        infra_id: &str,
        spec: NodeSpec,
        main_id: &str,
        load_balancer: &Peer,
    ) -> Result<Server, ClusterError> {
        let server_id = new_server_id();
        let op = TopologyOp::JoinMaster {
            target: server_id.clone(),
            main: main_id.to_owned(),
        };
        let address = spec.hops.target().map(|hop| hop.host.clone());
        self.admit(infra_id, &op, Some(main_id), address.as_deref()).await?;
        let lb = self.client.get_server(load_balancer.server_id.clone()).await?;

        let draft = spec.draft(&server_id, infra_id, ServerRole::Master);
        let request = JoinMaster {
            server_id,
            infra_id: infra_id.to_owned(),
            hops: spec.hops,
            lb_hops: lb.hop_chain,
            password: spec.password,
            lb_password: load_balancer.password.clone(),
            main_id: main_id.to_owned(),
        };
        let result = self
            .client
            .join_master(request)
            .await
            .map_err(|err| self.note_timeout(err, infra_id, &op, Some(&draft)))?;
        self.commit(infra_id, &op);
        self.register(draft, Some(&result)).await
    }

    /// Joins a worker using the join token from `main_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] when `main_id` is blank
    /// or not a tracked master, a topology error when the main master is
    /// degraded, otherwise the client or registry error.
    pub async fn join_worker(
        &self,
        infra_id: &str,
        spec: NodeSpec,
        main_id: &str,
    ) -> Result<Server, ClusterError> {
        let server_id = new_server_id();
        let op = TopologyOp::JoinWorker {
            target: server_id.clone(),
            main: main_id.to_owned(),
        };
        let address = spec.hops.target().map(|hop| hop.host.clone());
        self.admit(infra_id, &op, Some(main_id), address.as_deref()).await?;

        let draft = spec.draft(&server_id, infra_id, ServerRole::Worker);
        let request = JoinWorker {
            server_id,
            hops: spec.hops,
            password: spec.password,
            main_id: main_id.to_owned(),
        };
        let result = self
            .client
            .join_worker(request)
            .await
            .map_err(|err| self.note_timeout(err, infra_id, &op, Some(&draft)))?;
        self.commit(infra_id, &op);
        self.register(draft, Some(&result)).await
    }

    /// Rebuilds the tracked first master in place.
    ///
    /// # Errors
    ///
    /// Returns a topology error when `server_id` is not the first master,
    /// otherwise the client or registry error.
    pub async fn rebuild_first_master(
        &self,
        server_id: &str,
        password: Credential,
        load_balancer: Option<&Peer>,
    ) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::RebuildFirstMaster {
            target: server.id.clone(),
        };
        self.admit(&server.infra_id, &op, None, None).await?;
        let lb = self.resolve_optional(load_balancer).await?;

        let request = InstallFirstMaster {
            server_id: server.id.clone(),
            infra_id: server.infra_id.clone(),
            hops: server.hop_chain.clone(),
            lb_hops: lb.as_ref().map(|(balancer, _)| balancer.hop_chain.clone()),
            password: Some(password),
            lb_password: lb.map(|(_, secret)| secret),
        };
        let result = self
            .client
            .rebuild_first_master(request)
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_rebuild(&server, &op).await?;
        Ok(result)
    }

    /// Rebuilds a joined master from a different healthy master.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] for an unknown main
    /// master, a topology error when the target is not a master or the
    /// main master is the target or degraded, otherwise the client error.
    pub async fn rebuild_master(
        &self,
        server_id: &str,
        password: Credential,
        main_id: &str,
        load_balancer: &Peer,
    ) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::RebuildMaster {
            target: server.id.clone(),
            main: main_id.to_owned(),
        };
        self.admit(&server.infra_id, &op, Some(main_id), None).await?;
        let lb = self.client.get_server(load_balancer.server_id.clone()).await?;

        let request = JoinMaster {
            server_id: server.id.clone(),
            infra_id: server.infra_id.clone(),
            hops: server.hop_chain.clone(),
            lb_hops: lb.hop_chain,
            password,
            lb_password: load_balancer.password.clone(),
            main_id: main_id.to_owned(),
        };
        let result = self
            .client
            .rebuild_master(request)
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_rebuild(&server, &op).await?;
        Ok(result)
    }

    /// Rebuilds a worker using the join token from `main_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] for an unknown main
    /// master, a topology error when the target is not a worker, otherwise
    /// the client error.
    pub async fn rebuild_worker(
        &self,
        server_id: &str,
        password: Credential,
        main_id: &str,
    ) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::RebuildWorker {
            target: server.id.clone(),
            main: main_id.to_owned(),
        };
        self.admit(&server.infra_id, &op, Some(main_id), None).await?;

        let request = JoinWorker {
            server_id: server.id.clone(),
            hops: server.hop_chain.clone(),
            password,
            main_id: main_id.to_owned(),
        };
        let result = self
            .client
            .rebuild_worker(request)
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_rebuild(&server, &op).await?;
        Ok(result)
    }

    /// Repairs routing on a tracked load balancer.
    ///
    /// # Errors
    ///
    /// Returns a topology error when the server is not a tracked load
    /// balancer or no master exists, otherwise the client error.
    pub async fn rebuild_ha(&self, load_balancer_id: &str) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(load_balancer_id).await?;
        let op = TopologyOp::RebuildHa {
            target: server.id.clone(),
        };
        self.admit(&server.infra_id, &op, None, None).await?;
        let result = self
            .client
            .rebuild_ha(InstallLoadBalancer {
                server_id: server.id.clone(),
                infra_id: server.infra_id.clone(),
                hops: server.hop_chain.clone(),
            })
            .await?;
        self.commit(&server.infra_id, &op);
        Ok(result)
    }

    /// Renews control-plane certificates on a tracked master.
    ///
    /// # Errors
    ///
    /// Returns a topology error when the server is not a tracked master,
    /// otherwise the client error.
    pub async fn renew_certificate(&self, master_id: &str) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(master_id).await?;
        let op = TopologyOp::RenewCertificate {
            target: server.id.clone(),
        };
        self.admit(&server.infra_id, &op, None, None).await?;
        self.client
            .renew_certificate(
                NodeTarget::new(server.id.clone(), server.hop_chain.clone())
                    .in_infra(server.infra_id.clone()),
            )
            .await
    }

    /// Removes a master from the cluster. The registry record is kept and
    /// marked detached; see [`ClusterOrchestrator::retire_server`].
    ///
    /// # Errors
    ///
    /// Returns a topology error when the server is not a tracked master or
    /// `main` is the server itself or degraded, otherwise the client or
    /// registry error.
    pub async fn delete_master(
        &self,
        server_id: &str,
        password: Credential,
        load_balancer: Option<&Peer>,
        main: Option<&Peer>,
    ) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::DeleteMaster {
            target: server.id.clone(),
            main: main.map(|peer| peer.server_id.clone()),
        };
        self.admit(
            &server.infra_id,
            &op,
            main.map(|peer| peer.server_id.as_str()),
            None,
        )
        .await?;
        let lb = self.resolve_optional(load_balancer).await?;
        let survivor = self.resolve_optional(main).await?;

        let request = DeleteMaster {
            server_id: server.id.clone(),
            password,
            hops: server.hop_chain.clone(),
            lb_hops: lb.as_ref().map(|(balancer, _)| balancer.hop_chain.clone()),
            lb_password: lb.map(|(_, secret)| secret),
            main_hops: survivor.as_ref().map(|(master, _)| master.hop_chain.clone()),
            main_password: survivor.map(|(_, secret)| secret),
        };
        let result = self
            .client
            .delete_master(request)
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_removal(&server, &op).await?;
        Ok(result)
    }

    /// Drains and removes a worker through a surviving master. The registry
    /// record is kept and marked detached.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] when `main` is not a
    /// tracked master, a topology error when the server is not a tracked
    /// worker or `main` is degraded, otherwise the client or registry error.
    pub async fn delete_worker(
        &self,
        server_id: &str,
        password: Credential,
        main: &Peer,
    ) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::DeleteWorker {
            target: server.id.clone(),
            main: main.server_id.clone(),
        };
        self.admit(&server.infra_id, &op, Some(&main.server_id), None)
            .await?;
        let master = self.client.get_server(main.server_id.clone()).await?;

        let request = DeleteWorker {
            server_id: server.id.clone(),
            main_id: master.id,
            password,
            main_password: main.password.clone(),
            hops: server.hop_chain.clone(),
            main_hops: master.hop_chain,
        };
        let result = self
            .client
            .delete_worker(request)
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_removal(&server, &op).await?;
        Ok(result)
    }

    /// Removes a member by its node name, running the removal on `via`.
    /// Unlike the role-specific deletes, no balancer or etcd cleanup runs.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MainMasterNotFound`] when `via` is not a
    /// tracked master, a topology error when the server is not a member or
    /// `via` is the server itself or degraded, otherwise the client or
    /// registry error.
    pub async fn remove_node(&self, server_id: &str, via: &str) -> Result<CommandResult, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        let op = TopologyOp::RemoveNode {
            target: server.id.clone(),
            main: via.to_owned(),
        };
        self.admit(&server.infra_id, &op, Some(via), None).await?;
        let master = self.client.get_server(via).await?;

        let result = self
            .client
            .remove_node(RemoveNode {
                server_id: master.id,
                hops: master.hop_chain,
                node_name: server.name.clone(),
            })
            .await
            .map_err(|err| self.note_timeout(err, &server.infra_id, &op, None))?;
        self.finish_removal(&server, &op).await?;
        Ok(result)
    }

    /// Deletes a registry record once the server has left the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::StillClusterMember`] while the book still
    /// lists the server, [`ClusterError::OutcomeUnknown`] while a removal is
    /// unverified, otherwise the registry error.
    pub async fn retire_server(&self, server_id: &str) -> Result<(), ClusterError> {
        let server = self.client.get_server(server_id).await?;
        self.ensure_settled(&[server.id.as_str()], None)?;
        self.authorize(&server.infra_id, PermissionRole::Admin).await?;
        let book = self.load_book(&server.infra_id).await?;
        if book.is_member(&server.id) {
            return Err(ClusterError::StillClusterMember {
                server_id: server.id,
            });
        }
        self.client.delete_server(server.id.clone()).await?;
        info!(server_id = %server.id, "retired server record");
        Ok(())
    }

    async fn resolve_optional(
        &self,
        named: Option<&Peer>,
    ) -> Result<Option<(Server, Credential)>, ClusterError> {
        match named {
            Some(peer) => {
                let server = self.client.get_server(peer.server_id.clone()).await?;
                Ok(Some((server, peer.password.clone())))
            }
            None => Ok(None),
        }
    }

    async fn finish_rebuild(&self, server: &Server, op: &TopologyOp) -> Result<(), ClusterError> {
        self.commit(&server.infra_id, op);
        self.set_status(server, ServerStatus::Active).await
    }

    async fn finish_removal(&self, server: &Server, op: &TopologyOp) -> Result<(), ClusterError> {
        self.commit(&server.infra_id, op);
        self.set_status(server, ServerStatus::Detached).await
    }
}
