//! Operations whose outcome is unknown after a caller-side timeout.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{ClusterOrchestrator, lock};
use crate::error::ClusterError;
use crate::hops::HopChain;
use crate::operation::{ClusterNode, NodeTarget};
use crate::registry::{PermissionRole, ServerDraft, ServerStatus};
use crate::topology::{TopologyError, TopologyOp};
use crate::transport::Transport;

/// A topology change that timed out before the backend answered.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingOperation {
    /// Infra the change belongs to.
    pub infra_id: String,
    /// Change that may or may not have happened.
    pub op: TopologyOp,
    /// Registry record to write if the change turns out to have happened.
    pub draft: Option<ServerDraft>,
    /// When the timeout was observed.
    pub recorded_at: DateTime<Utc>,
}

impl PendingOperation {
    fn blocks(&self, server_ids: &[&str], address: Option<&str>) -> bool {
        server_ids.contains(&self.op.target())
            || address.is_some_and(|addr| {
                self.draft
                    .as_ref()
                    .is_some_and(|draft| draft.address == addr)
            })
    }
}

/// Outcome of [`ClusterOrchestrator::verify_pending`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verification {
    /// No unknown outcome was recorded for the server.
    NothingPending,
    /// The change happened; the book and registry now reflect it.
    Completed,
    /// The change did not happen; the operation may be retried.
    NotApplied,
}

/// Whether the live node list can confirm the effect of `op`.
const fn observable(op: &TopologyOp) -> bool {
    matches!(
        op,
        TopologyOp::InstallFirstMaster { .. }
            | TopologyOp::JoinMaster { .. }
            | TopologyOp::JoinWorker { .. }
            | TopologyOp::RebuildFirstMaster { .. }
            | TopologyOp::RebuildMaster { .. }
            | TopologyOp::RebuildWorker { .. }
            | TopologyOp::DeleteMaster { .. }
            | TopologyOp::DeleteWorker { .. }
            | TopologyOp::RemoveNode { .. }
    )
}

impl<T: Transport> ClusterOrchestrator<T> {
    /// Unknown-outcome record for `server_id`, if any.
    #[must_use]
    pub fn pending_operation(&self, server_id: &str) -> Option<PendingOperation> {
        lock(&self.pending).get(server_id).cloned()
    }

    /// Every unknown-outcome record, oldest first.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        let mut records: Vec<_> = lock(&self.pending).values().cloned().collect();
        records.sort_by_key(|record| record.recorded_at);
        records
    }

    /// Resolves an unknown outcome by asking a healthy master for the live
    /// node list.
    ///
    /// A node that shows up (or, for removals, has gone) completes the
    /// change in the book and registry. Otherwise the record is dropped so
    /// the operation can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::NoMaster`] when no master can answer, or the
    /// client error from listing nodes or writing the registry. The pending
    /// record and the book are left untouched on error, so the call can be
    /// repeated.
    pub async fn verify_pending(&self, server_id: &str) -> Result<Verification, ClusterError> {
        let Some(pending) = self.pending_operation(server_id) else {
            return Ok(Verification::NothingPending);
        };
        self.authorize(&pending.infra_id, PermissionRole::Admin).await?;

        let (name, address) = match &pending.draft {
            Some(draft) => (draft.name.clone(), draft.address.clone()),
            None => {
                let server = self.client.get_server(server_id).await?;
                (server.name, server.address)
            }
        };
        let (probe_id, probe_hops) = self.probe(&pending).await?;
        let nodes = self
            .client
            .calculate_nodes(NodeTarget::new(probe_id, probe_hops).in_infra(pending.infra_id.clone()))
            .await?;
        let live = nodes
            .iter()
            .find(|node| node.name == name || node.internal_ip.as_deref() == Some(address.as_str()));

        if !applied(&pending.op, live) {
            lock(&self.pending).remove(server_id);
            info!(server_id, operation = pending.op.name(), "pending operation was not applied");
            return Ok(Verification::NotApplied);
        }

        match (&pending.op, pending.draft.clone()) {
            (_, Some(draft)) => {
                self.register(draft, None).await?;
            }
            (
                TopologyOp::DeleteMaster { target, .. }
                | TopologyOp::DeleteWorker { target, .. }
                | TopologyOp::RemoveNode { target, .. },
                None,
            ) => {
                let server = self.client.get_server(target.clone()).await?;
                self.set_status(&server, ServerStatus::Detached).await?;
            }
            (op, None) => {
                let server = self.client.get_server(op.target().to_owned()).await?;
                self.set_status(&server, ServerStatus::Active).await?;
            }
        }
        lock(&self.pending).remove(server_id);
        self.commit(&pending.infra_id, &pending.op);
        info!(server_id, operation = pending.op.name(), "pending operation completed remotely");
        Ok(Verification::Completed)
    }

    /// Records an unknown outcome when `err` is a timeout of an observable
    /// change, then hands the error back naming the server to verify.
    pub(super) fn note_timeout(
        &self,
        err: ClusterError,
        infra_id: &str,
        op: &TopologyOp,
        draft: Option<&ServerDraft>,
    ) -> ClusterError {
        let (operation, after) = match err {
            ClusterError::Timeout {
                operation, after, ..
            } => (operation, after),
            other => return other,
        };
        if !observable(op) {
            return ClusterError::Timeout {
                operation,
                after,
                server_id: None,
            };
        }
        warn!(
            infra_id,
            operation = op.name(),
            target = op.target(),
            "outcome unknown; recorded for verification"
        );
        lock(&self.pending).insert(
            op.target().to_owned(),
            PendingOperation {
                infra_id: infra_id.to_owned(),
                op: op.clone(),
                draft: draft.cloned(),
                recorded_at: Utc::now(),
            },
        );
        ClusterError::Timeout {
            operation,
            after,
            server_id: Some(op.target().to_owned()),
        }
    }

    /// Rejects work that touches a server with an unknown outcome.
    pub(super) fn ensure_settled(
        &self,
        server_ids: &[&str],
        address: Option<&str>,
    ) -> Result<(), ClusterError> {
        let pending = lock(&self.pending);
        match pending
            .values()
            .find(|record| record.blocks(server_ids, address))
        {
            Some(record) => Err(ClusterError::OutcomeUnknown {
                server_id: record.op.target().to_owned(),
                operation: record.op.name(),
            }),
            None => Ok(()),
        }
    }

    /// Picks a master to list nodes from. A pending first master or joining
    /// master can answer for itself when no other master is healthy.
    async fn probe(&self, pending: &PendingOperation) -> Result<(String, HopChain), ClusterError> {
        let book = self.load_book(&pending.infra_id).await?;
        let target = pending.op.target();
        if let Some(master) = book.healthy_masters().find(|id| *id != target) {
            let server = self.client.get_server(master.to_owned()).await?;
            return Ok((server.id, server.hop_chain));
        }
        match (&pending.op, &pending.draft) {
            (
                TopologyOp::InstallFirstMaster { target: joining }
                | TopologyOp::JoinMaster {
                    target: joining, ..
                },
                Some(draft),
            ) => Ok((joining.clone(), draft.hop_chain.clone())),
            _ => Err(TopologyError::NoMaster {
                operation: "calculateNodes",
            }
            .into()),
        }
    }
}

fn applied(op: &TopologyOp, live: Option<&ClusterNode>) -> bool {
    match op {
        TopologyOp::DeleteMaster { .. }
        | TopologyOp::DeleteWorker { .. }
        | TopologyOp::RemoveNode { .. } => live.is_none(),
        TopologyOp::RebuildFirstMaster { .. }
        | TopologyOp::RebuildMaster { .. }
        | TopologyOp::RebuildWorker { .. } => live.is_some_and(|node| node.status.is_healthy()),
        _ => live.is_some(),
    }
}
