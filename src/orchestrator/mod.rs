//! Topology-aware cluster lifecycle on top of [`ClusterClient`].
//!
//! The orchestrator keeps one [`ClusterTopology`] book per infra, seeded from
//! the registry. Every lifecycle call is admitted against that book before
//! anything is sent, and the book and registry only change after the remote
//! side confirms success. Calls that time out leave a pending record that
//! [`ClusterOrchestrator::verify_pending`] resolves.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::client::ClusterClient;
use crate::credential::Credential;
use crate::error::ClusterError;
use crate::hops::HopChain;
use crate::operation::{GetServers, NodeStatus, NodeTarget};
use crate::registry::{PermissionRole, Server, ServerDraft, ServerPatch, ServerRole, ServerStatus};
use crate::result::CommandResult;
use crate::topology::{ClusterTopology, TopologyError, TopologyOp};
use crate::transport::Transport;

mod bootstrap;
mod pending;

pub use pending::{PendingOperation, Verification};

/// A node about to be installed or joined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSpec {
    /// Kubernetes node name, recorded as the server name.
    pub name: String,
    /// Route to the node.
    pub hops: HopChain,
    /// Privileged password on the node.
    pub password: Credential,
}

impl NodeSpec {
    /// Describes a node reached through `hops`.
    #[must_use]
    pub fn new(name: impl Into<String>, hops: HopChain, password: impl Into<Credential>) -> Self {
        Self {
            name: name.into(),
            hops,
            password: password.into(),
        }
    }

    fn draft(&self, server_id: &str, infra_id: &str, role: ServerRole) -> ServerDraft {
        let mut draft = ServerDraft::new(self.name.clone(), infra_id, role, self.hops.clone());
        draft.id = Some(server_id.to_owned());
        draft
    }
}

/// A registered server taking part in an operation, with its password.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Peer {
    /// Registry id of the server.
    pub server_id: String,
    /// Privileged password on the server.
    pub password: Credential,
}

impl Peer {
    /// Names a registered server and its password.
    #[must_use]
    pub fn new(server_id: impl Into<String>, password: impl Into<Credential>) -> Self {
        Self {
            server_id: server_id.into(),
            password: password.into(),
        }
    }
}

/// Runs cluster lifecycle operations with topology guards and registry
/// bookkeeping.
#[derive(Debug)]
pub struct ClusterOrchestrator<T> {
    client: ClusterClient<T>,
    books: Mutex<HashMap<String, ClusterTopology>>,
    pending: Mutex<HashMap<String, PendingOperation>>,
    acting_user: Option<String>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_server_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl<T: Transport> ClusterOrchestrator<T> {
    /// Wraps `client` with empty topology books.
    #[must_use]
    pub fn new(client: ClusterClient<T>) -> Self {
        Self {
            client,
            books: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            acting_user: None,
        }
    }

    /// Requires `user_id` to hold the admin role on an infra before any
    /// topology change is sent.
    #[must_use]
    pub fn acting_as(mut self, user_id: impl Into<String>) -> Self {
        self.acting_user = Some(user_id.into());
        self
    }

    /// Underlying client.
    #[must_use]
    pub const fn client(&self) -> &ClusterClient<T> {
        &self.client
    }

    /// Snapshot of the topology book for `infra_id`, loading it from the
    /// registry on first use.
    ///
    /// # Errors
    ///
    /// Returns the registry error when the server list cannot be read.
    pub async fn topology(&self, infra_id: &str) -> Result<ClusterTopology, ClusterError> {
        self.load_book(infra_id).await
    }

    /// Drops the cached book for `infra_id`; the next call reloads it.
    pub fn forget(&self, infra_id: &str) {
        lock(&self.books).remove(infra_id);
    }

    /// Reads a node's status and records the observation in the book. A
    /// registered member whose status changed is also updated in the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ServerNotFound`] for unknown servers,
    /// otherwise the client or registry error.
    pub async fn observe_node(&self, server_id: &str) -> Result<NodeStatus, ClusterError> {
        let server = self.client.get_server(server_id).await?;
        self.authorize(&server.infra_id, PermissionRole::Member).await?;
        let status = self
            .client
            .get_node_status(
                NodeTarget::new(server.id.clone(), server.hop_chain.clone())
                    .in_infra(server.infra_id.clone()),
            )
            .await?;

        let book = self.load_book(&server.infra_id).await?;
        if book.is_member(&server.id) {
            let (op, registry_status) = if status.status.is_healthy() {
                (
                    TopologyOp::MarkHealthy {
                        target: server.id.clone(),
                    },
                    ServerStatus::Active,
                )
            } else {
                (
                    TopologyOp::MarkDegraded {
                        target: server.id.clone(),
                    },
                    ServerStatus::Unhealthy,
                )
            };
            self.commit(&server.infra_id, &op);
            self.set_status(&server, registry_status).await?;
        }
        Ok(status)
    }

    async fn authorize(&self, infra_id: &str, required: PermissionRole) -> Result<(), ClusterError> {
        match &self.acting_user {
            Some(user_id) => self.client.authorize(user_id, infra_id, required).await,
            None => Ok(()),
        }
    }

    async fn load_book(&self, infra_id: &str) -> Result<ClusterTopology, ClusterError> {
        let cached = lock(&self.books).get(infra_id).cloned();
        if let Some(book) = cached {
            return Ok(book);
        }
        // A degraded empty listing would seed an empty book, so the registry
        // read propagates failures here.
        let servers = self
            .client
            .call(GetServers {
                infra_id: infra_id.to_owned(),
            })
            .await?;
        let seeded = ClusterTopology::from_servers(&servers);
        info!(infra_id, state = ?seeded.state(), "loaded topology book");
        Ok(lock(&self.books)
            .entry(infra_id.to_owned())
            .or_insert(seeded)
            .clone())
    }

    /// Checks everything that must hold before a topology change is sent.
    async fn admit(
        &self,
        infra_id: &str,
        op: &TopologyOp,
        main_id: Option<&str>,
        address: Option<&str>,
    ) -> Result<(), ClusterError> {
        let mut involved = vec![op.target()];
        involved.extend(main_id);
        self.ensure_settled(&involved, address)?;
        self.authorize(infra_id, PermissionRole::Admin).await?;

        let infra = self.client.get_infra(infra_id).await?;
        if !infra.kind.supports_bootstrap() {
            return Err(ClusterError::UnsupportedInfra {
                infra_id: infra.id,
                kind: infra.kind.to_string(),
                operation: op.name(),
            });
        }

        let book = self.load_book(infra_id).await?;
        if let Some(main) = main_id {
            if !book.masters().any(|master| master == main) {
                return Err(ClusterError::MainMasterNotFound {
                    main_id: main.to_owned(),
                });
            }
        }
        book.check(op)?;
        if let Some(addr) = address {
            self.require_new_address(infra_id, &book, addr).await?;
        }
        Ok(())
    }

    /// Rejects installing or joining a machine that is already a member
    /// under another registry id.
    async fn require_new_address(
        &self,
        infra_id: &str,
        book: &ClusterTopology,
        address: &str,
    ) -> Result<(), ClusterError> {
        let servers = self
            .client
            .call(GetServers {
                infra_id: infra_id.to_owned(),
            })
            .await?;
        match servers
            .iter()
            .find(|server| server.address == address && book.is_member(&server.id))
        {
            Some(existing) => Err(TopologyError::AlreadyMember {
                server_id: existing.id.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Applies a confirmed change to the cached book.
    fn commit(&self, infra_id: &str, op: &TopologyOp) {
        let mut books = lock(&self.books);
        let Some(book) = books.get_mut(infra_id) else {
            return;
        };
        match book.apply(op) {
            Ok(state) => info!(
                infra_id,
                operation = op.name(),
                target = op.target(),
                ?state,
                "topology updated"
            ),
            Err(err) => warn!(
                infra_id,
                operation = op.name(),
                error = %err,
                "remote change confirmed but the book disagrees; reload with forget()"
            ),
        }
    }

    /// Records a confirmed node in the registry, copying join material the
    /// first master reports.
    async fn register(
        &self,
        mut draft: ServerDraft,
        result: Option<&CommandResult>,
    ) -> Result<Server, ClusterError> {
        draft.status = ServerStatus::Active;
        if let Some(details) = result.and_then(|outcome| outcome.details.as_ref()) {
            let text = |key: &str| {
                details
                    .get(key)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            };
            draft.join_command = text("joinCommand");
            draft.certificate_key = text("certificateKey");
        }
        let server = self.client.create_server(draft).await?;
        info!(server_id = %server.id, role = %server.role, "registered server");
        Ok(server)
    }

    async fn set_status(&self, server: &Server, status: ServerStatus) -> Result<(), ClusterError> {
        if server.status == status {
            return Ok(());
        }
        self.client
            .update_server(server.id.clone(), ServerPatch::status(status))
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests;
