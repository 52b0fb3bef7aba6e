//! Per-infra cluster membership and the guards for changing it.
//!
//! [`ClusterTopology`] is the client's book of which registry servers are
//! live cluster members and in what role. Every topology-changing command is
//! first checked against the book as a [`TopologyOp`]; the book only moves
//! once the remote side has confirmed success.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::registry::{Server, ServerRole, ServerStatus};

/// Coarse state of one infra's cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopologyState {
    /// Nothing installed.
    Empty,
    /// A load balancer exists but no control plane.
    LoadBalancerReady,
    /// Exactly one master.
    SingleMaster,
    /// Two or more masters.
    MultiMaster,
    /// At least one member is marked unhealthy.
    Degraded,
}

/// A membership change, or health observation, checked against the book.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TopologyOp {
    /// Adds a load balancer.
    InstallLoadBalancer {
        /// Load balancer server id.
        target: String,
    },
    /// Bootstraps the first master.
    InstallFirstMaster {
        /// New master server id.
        target: String,
    },
    /// Joins another master.
    JoinMaster {
        /// Joining server id.
        target: String,
        /// Master supplying join material.
        main: String,
    },
    /// Joins a worker.
    JoinWorker {
        /// Joining server id.
        target: String,
        /// Master supplying the join token.
        main: String,
    },
    /// Rebuilds the first master in place.
    RebuildFirstMaster {
        /// First master server id.
        target: String,
    },
    /// Rebuilds a joined master.
    RebuildMaster {
        /// Master being rebuilt.
        target: String,
        /// Healthy master supplying join material.
        main: String,
    },
    /// Rebuilds a worker.
    RebuildWorker {
        /// Worker being rebuilt.
        target: String,
        /// Healthy master supplying the join token.
        main: String,
    },
    /// Repairs load balancer routing.
    RebuildHa {
        /// Load balancer server id.
        target: String,
    },
    /// Renews control-plane certificates.
    RenewCertificate {
        /// Master the renewal runs on.
        target: String,
    },
    /// Removes a master.
    DeleteMaster {
        /// Master server id.
        target: String,
        /// Surviving master that updates the control plane, if any.
        main: Option<String>,
    },
    /// Removes a worker.
    DeleteWorker {
        /// Worker server id.
        target: String,
        /// Surviving master that drains the worker.
        main: String,
    },
    /// Removes any member by node name.
    RemoveNode {
        /// Member server id.
        target: String,
        /// Surviving master the removal runs on.
        main: String,
    },
    /// Records a failed health observation.
    MarkDegraded {
        /// Member server id.
        target: String,
    },
    /// Records a healthy observation.
    MarkHealthy {
        /// Member server id.
        target: String,
    },
}

impl TopologyOp {
    /// Server the operation acts on.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::InstallLoadBalancer { target }
            | Self::InstallFirstMaster { target }
            | Self::JoinMaster { target, .. }
            | Self::JoinWorker { target, .. }
            | Self::RebuildFirstMaster { target }
            | Self::RebuildMaster { target, .. }
            | Self::RebuildWorker { target, .. }
            | Self::RebuildHa { target }
            | Self::RenewCertificate { target }
            | Self::DeleteMaster { target, .. }
            | Self::DeleteWorker { target, .. }
            | Self::RemoveNode { target, .. }
            | Self::MarkDegraded { target }
            | Self::MarkHealthy { target } => target,
        }
    }

    /// Wire name of the remote operation this guards.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InstallLoadBalancer { .. } => "installLoadBalancer",
            Self::InstallFirstMaster { .. } => "installFirstMaster",
            Self::JoinMaster { .. } => "joinMaster",
            Self::JoinWorker { .. } => "joinWorker",
            Self::RebuildFirstMaster { .. } => "rebuildFirstMaster",
            Self::RebuildMaster { .. } => "rebuildMaster",
            Self::RebuildWorker { .. } => "rebuildWorker",
            Self::RebuildHa { .. } => "rebuildHA",
            Self::RenewCertificate { .. } => "renewCertificate",
            Self::DeleteMaster { .. } => "deleteMaster",
            Self::DeleteWorker { .. } => "deleteWorker",
            Self::RemoveNode { .. } => "removeNode",
            Self::MarkDegraded { .. } | Self::MarkHealthy { .. } => "getNodeStatus",
        }
    }
}

/// Raised when an operation is not legal from the current membership.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TopologyError {
    /// Raised when a first master is installed twice.
    #[error("cluster already has master {existing}; use joinMaster or rebuildFirstMaster")]
    AlreadyBootstrapped {
        /// Master already tracked.
        existing: String,
    },
    /// Raised when an operation needs a control plane that does not exist.
    #[error("{operation} requires at least one master; run installFirstMaster first")]
    NoMaster {
        /// Operation name.
        operation: &'static str,
    },
    /// Raised when a load balancer is installed after the control plane.
    #[error("load balancer {server_id} must be installed before the first master")]
    ControlPlaneExists {
        /// Load balancer server id.
        server_id: String,
    },
    /// Raised when `rebuildHA` has no load balancer to repair.
    #[error("{server_id} is not a tracked load balancer")]
    NotLoadBalancer {
        /// Server id passed to the operation.
        server_id: String,
    },
    /// Raised when the main master is not a tracked master.
    #[error("main master {main_id} is not a master of this cluster")]
    MainNotMaster {
        /// Referenced main id.
        main_id: String,
    },
    /// Raised when the main master is marked unhealthy.
    #[error("main master {main_id} is degraded; pick a healthy master")]
    MainUnhealthy {
        /// Referenced main id.
        main_id: String,
    },
    /// Raised when the main master is the server being rebuilt or removed.
    #[error("{server_id} cannot be its own main master")]
    MainIsTarget {
        /// Server id.
        server_id: String,
    },
    /// Raised when a joining server is already a member.
    #[error("{server_id} is already a cluster member")]
    AlreadyMember {
        /// Server id.
        server_id: String,
    },
    /// Raised when the target is not a member in the required role.
    #[error("{server_id} is not a tracked {role}")]
    NotMember {
        /// Server id.
        server_id: String,
        /// Role the operation requires.
        role: &'static str,
    },
    /// Raised when `rebuildFirstMaster` targets another master.
    #[error("{server_id} is not the first master (first master is {first_master})")]
    NotFirstMaster {
        /// Server id passed to the operation.
        server_id: String,
        /// Tracked first master.
        first_master: String,
    },
}

/// Tracked membership of one infra's cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterTopology {
    load_balancers: BTreeSet<String>,
    first_master: Option<String>,
    masters: BTreeSet<String>,
    workers: BTreeSet<String>,
    degraded: BTreeSet<String>,
}

impl ClusterTopology {
    /// An empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the book from registry records.
    ///
    /// Pending and detached records are not members and are skipped. The
    /// first master is the master holding a certificate key, falling back
    /// to the first master listed. Unhealthy records start degraded.
    #[must_use]
    pub fn from_servers(servers: &[Server]) -> Self {
        let mut book = Self::new();
        for server in servers
            .iter()
            .filter(|server| !matches!(server.status, ServerStatus::Pending | ServerStatus::Detached))
        {
            let id = server.id.clone();
            match server.role {
                ServerRole::Master => {
                    if server.is_first_master() && book.first_master.is_none() {
                        book.first_master = Some(id.clone());
                    }
                    book.masters.insert(id.clone());
                }
                ServerRole::Worker => {
                    book.workers.insert(id.clone());
                }
                ServerRole::Loadbalancer => {
                    book.load_balancers.insert(id.clone());
                }
                ServerRole::Docker | ServerRole::Baremetal | ServerRole::Other => continue,
            }
            if server.status == ServerStatus::Unhealthy {
                book.degraded.insert(id);
            }
        }
        if book.first_master.is_none() {
            book.first_master = servers
                .iter()
                .find(|server| book.masters.contains(&server.id))
                .map(|server| server.id.clone());
        }
        book
    }

    /// Current coarse state.
    #[must_use]
    pub fn state(&self) -> TopologyState {
        if !self.degraded.is_empty() {
            TopologyState::Degraded
        } else if self.masters.len() > 1 {
            TopologyState::MultiMaster
        } else if self.masters.len() == 1 {
            TopologyState::SingleMaster
        } else if self.load_balancers.is_empty() {
            TopologyState::Empty
        } else {
            TopologyState::LoadBalancerReady
        }
    }

    /// Tracked first master.
    #[must_use]
    pub fn first_master(&self) -> Option<&str> {
        self.first_master.as_deref()
    }

    /// Tracked masters.
    pub fn masters(&self) -> impl Iterator<Item = &str> {
        self.masters.iter().map(String::as_str)
    }

    /// Tracked masters not marked degraded.
    pub fn healthy_masters(&self) -> impl Iterator<Item = &str> {
        self.masters
            .iter()
            .filter(|id| !self.degraded.contains(*id))
            .map(String::as_str)
    }

    /// Tracked workers.
    pub fn workers(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(String::as_str)
    }

    /// Tracked load balancers.
    pub fn load_balancers(&self) -> impl Iterator<Item = &str> {
        self.load_balancers.iter().map(String::as_str)
    }

    /// Role of a tracked member.
    #[must_use]
    pub fn role_of(&self, server_id: &str) -> Option<ServerRole> {
        if self.masters.contains(server_id) {
            Some(ServerRole::Master)
        } else if self.workers.contains(server_id) {
            Some(ServerRole::Worker)
        } else if self.load_balancers.contains(server_id) {
            Some(ServerRole::Loadbalancer)
        } else {
            None
        }
    }

    /// Whether the server is a tracked member of any role.
    #[must_use]
    pub fn is_member(&self, server_id: &str) -> bool {
        self.role_of(server_id).is_some()
    }

    /// Whether the server is marked degraded.
    #[must_use]
    pub fn is_degraded(&self, server_id: &str) -> bool {
        self.degraded.contains(server_id)
    }

    /// Checks whether `op` is legal without changing the book.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] describing the violated guard.
    pub fn check(&self, op: &TopologyOp) -> Result<(), TopologyError> {
        match op {
            TopologyOp::InstallLoadBalancer { target } => {
                self.require_absent(target)?;
                if self.masters.is_empty() {
                    Ok(())
                } else {
                    Err(TopologyError::ControlPlaneExists {
                        server_id: target.clone(),
                    })
                }
            }
            TopologyOp::InstallFirstMaster { target } => {
                if let Some(existing) = self
                    .first_master
                    .as_ref()
                    .or_else(|| self.masters.iter().next())
                {
                    return Err(TopologyError::AlreadyBootstrapped {
                        existing: existing.clone(),
                    });
                }
                self.require_absent(target)
            }
            TopologyOp::JoinMaster { target, main } | TopologyOp::JoinWorker { target, main } => {
                self.require_master_exists(op.name())?;
                self.require_healthy_main(main)?;
                self.require_absent(target)
            }
            TopologyOp::RebuildFirstMaster { target } => match &self.first_master {
                Some(first) if first == target => Ok(()),
                Some(first) => Err(TopologyError::NotFirstMaster {
                    server_id: target.clone(),
                    first_master: first.clone(),
                }),
                None => Err(TopologyError::NoMaster {
                    operation: op.name(),
                }),
            },
            TopologyOp::RebuildMaster { target, main } => {
                Self::require_in(&self.masters, target, "master")?;
                if target == main {
                    return Err(TopologyError::MainIsTarget {
                        server_id: target.clone(),
                    });
                }
                self.require_healthy_main(main)
            }
            TopologyOp::RebuildWorker { target, main } => {
                Self::require_in(&self.workers, target, "worker")?;
                self.require_healthy_main(main)
            }
            TopologyOp::RebuildHa { target } => {
                if !self.load_balancers.contains(target) {
                    return Err(TopologyError::NotLoadBalancer {
                        server_id: target.clone(),
                    });
                }
                self.require_master_exists(op.name())
            }
            TopologyOp::RenewCertificate { target } => {
                self.require_master_exists(op.name())?;
                Self::require_in(&self.masters, target, "master")
            }
            TopologyOp::DeleteMaster { target, main } => {
                Self::require_in(&self.masters, target, "master")?;
                main.as_deref()
                    .map_or(Ok(()), |survivor| self.require_surviving_main(target, survivor))
            }
            TopologyOp::DeleteWorker { target, main } => {
                Self::require_in(&self.workers, target, "worker")?;
                self.require_surviving_main(target, main)
            }
            TopologyOp::RemoveNode { target, main } => {
                self.require_member(target)?;
                self.require_surviving_main(target, main)
            }
            TopologyOp::MarkDegraded { target } | TopologyOp::MarkHealthy { target } => {
                self.require_member(target)
            }
        }
    }

    /// Checks `op` and applies it, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] and leaves the book untouched when the
    /// guard rejects the operation.
    pub fn apply(&mut self, op: &TopologyOp) -> Result<TopologyState, TopologyError> {
        self.check(op)?;
        match op {
            TopologyOp::InstallLoadBalancer { target } => {
                self.load_balancers.insert(target.clone());
            }
            TopologyOp::InstallFirstMaster { target } => {
                self.first_master = Some(target.clone());
                self.masters.insert(target.clone());
            }
            TopologyOp::JoinMaster { target, .. } => {
                self.masters.insert(target.clone());
            }
            TopologyOp::JoinWorker { target, .. } => {
                self.workers.insert(target.clone());
            }
            TopologyOp::RebuildFirstMaster { target }
            | TopologyOp::RebuildMaster { target, .. }
            | TopologyOp::RebuildWorker { target, .. }
            | TopologyOp::RebuildHa { target }
            | TopologyOp::MarkHealthy { target } => {
                self.degraded.remove(target);
            }
            TopologyOp::RenewCertificate { .. } => {}
            TopologyOp::MarkDegraded { target } => {
                self.degraded.insert(target.clone());
            }
            TopologyOp::DeleteMaster { target, .. }
            | TopologyOp::DeleteWorker { target, .. }
            | TopologyOp::RemoveNode { target, .. } => self.drop_member(target),
        }
        Ok(self.state())
    }

    fn drop_member(&mut self, target: &str) {
        self.load_balancers.remove(target);
        self.workers.remove(target);
        self.degraded.remove(target);
        if self.masters.remove(target) && self.first_master.as_deref() == Some(target) {
            // The slot follows a surviving master and empties with the last.
            self.first_master = self.masters.iter().next().cloned();
        }
    }

    fn require_master_exists(&self, operation: &'static str) -> Result<(), TopologyError> {
        if self.masters.is_empty() {
            return Err(TopologyError::NoMaster { operation });
        }
        Ok(())
    }

    fn require_healthy_main(&self, main: &str) -> Result<(), TopologyError> {
        if !self.masters.contains(main) {
            return Err(TopologyError::MainNotMaster {
                main_id: main.to_owned(),
            });
        }
        if self.degraded.contains(main) {
            return Err(TopologyError::MainUnhealthy {
                main_id: main.to_owned(),
            });
        }
        Ok(())
    }

    fn require_surviving_main(&self, target: &str, main: &str) -> Result<(), TopologyError> {
        if target == main {
            return Err(TopologyError::MainIsTarget {
                server_id: target.to_owned(),
            });
        }
        self.require_healthy_main(main)
    }

    fn require_member(&self, target: &str) -> Result<(), TopologyError> {
        if self.is_member(target) {
            return Ok(());
        }
        Err(TopologyError::NotMember {
            server_id: target.to_owned(),
            role: "member",
        })
    }

    fn require_absent(&self, target: &str) -> Result<(), TopologyError> {
        if self.is_member(target) {
            return Err(TopologyError::AlreadyMember {
                server_id: target.to_owned(),
            });
        }
        Ok(())
    }

    fn require_in(
        set: &BTreeSet<String>,
        target: &str,
        role: &'static str,
    ) -> Result<(), TopologyError> {
        if set.contains(target) {
            return Ok(());
        }
        Err(TopologyError::NotMember {
            server_id: target.to_owned(),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::hops::{HopChain, HopDescriptor};

    fn op_install_first(target: &str) -> TopologyOp {
        TopologyOp::InstallFirstMaster {
            target: target.to_owned(),
        }
    }

    #[fixture]
    fn single_master() -> ClusterTopology {
        let mut book = ClusterTopology::new();
        book.apply(&TopologyOp::InstallLoadBalancer {
            target: String::from("lb1"),
        })
        .expect("install lb");
        book.apply(&op_install_first("m1")).expect("install m1");
        book
    }

    #[rstest]
    fn fresh_cluster_walks_through_states() {
        let mut book = ClusterTopology::new();
        assert_eq!(book.state(), TopologyState::Empty);
        let state = book
            .apply(&TopologyOp::InstallLoadBalancer {
                target: String::from("lb1"),
            })
            .expect("install lb");
        assert_eq!(state, TopologyState::LoadBalancerReady);
        assert_eq!(
            book.apply(&op_install_first("m1")),
            Ok(TopologyState::SingleMaster)
        );
        let state = book
            .apply(&TopologyOp::JoinMaster {
                target: String::from("m2"),
                main: String::from("m1"),
            })
            .expect("join m2");
        assert_eq!(state, TopologyState::MultiMaster);
    }

    #[rstest]
    fn second_first_master_is_rejected(mut single_master: ClusterTopology) {
        let err = single_master
            .apply(&op_install_first("m2"))
            .expect_err("second install must fail");
        assert_eq!(
            err,
            TopologyError::AlreadyBootstrapped {
                existing: String::from("m1")
            }
        );
        assert!(!single_master.is_member("m2"));
    }

    #[rstest]
    #[case::unknown_main(
        TopologyOp::JoinWorker { target: String::from("w1"), main: String::from("ghost") },
        TopologyError::MainNotMaster { main_id: String::from("ghost") }
    )]
    #[case::rejoin(
        TopologyOp::JoinMaster { target: String::from("m1"), main: String::from("m1") },
        TopologyError::AlreadyMember { server_id: String::from("m1") }
    )]
    #[case::rebuild_from_self(
        TopologyOp::RebuildMaster { target: String::from("m1"), main: String::from("m1") },
        TopologyError::MainIsTarget { server_id: String::from("m1") }
    )]
    #[case::rebuild_unknown_worker(
        TopologyOp::RebuildWorker { target: String::from("w9"), main: String::from("m1") },
        TopologyError::NotMember { server_id: String::from("w9"), role: "worker" }
    )]
    #[case::lb_after_masters(
        TopologyOp::InstallLoadBalancer { target: String::from("lb2") },
        TopologyError::ControlPlaneExists { server_id: String::from("lb2") }
    )]
    #[case::delete_master_via_itself(
        TopologyOp::DeleteMaster { target: String::from("m1"), main: Some(String::from("m1")) },
        TopologyError::MainIsTarget { server_id: String::from("m1") }
    )]
    #[case::delete_master_via_unknown(
        TopologyOp::DeleteMaster { target: String::from("m1"), main: Some(String::from("ghost")) },
        TopologyError::MainNotMaster { main_id: String::from("ghost") }
    )]
    #[case::remove_node_via_itself(
        TopologyOp::RemoveNode { target: String::from("m1"), main: String::from("m1") },
        TopologyError::MainIsTarget { server_id: String::from("m1") }
    )]
    #[case::remove_node_via_load_balancer(
        TopologyOp::RemoveNode { target: String::from("m1"), main: String::from("lb1") },
        TopologyError::MainNotMaster { main_id: String::from("lb1") }
    )]
    #[case::rebuild_ha_on_master(
        TopologyOp::RebuildHa { target: String::from("m1") },
        TopologyError::NotLoadBalancer { server_id: String::from("m1") }
    )]
    fn guards_reject_illegal_operations(
        single_master: ClusterTopology,
        #[case] op: TopologyOp,
        #[case] expected: TopologyError,
    ) {
        assert_eq!(single_master.check(&op), Err(expected));
    }

    #[rstest]
    fn joins_need_a_control_plane() {
        let book = ClusterTopology::new();
        let err = book
            .check(&TopologyOp::JoinWorker {
                target: String::from("w1"),
                main: String::from("m1"),
            })
            .expect_err("join without masters");
        assert_eq!(
            err,
            TopologyError::NoMaster {
                operation: "joinWorker"
            }
        );
    }

    #[rstest]
    fn degraded_main_cannot_supply_join_material(mut single_master: ClusterTopology) {
        single_master
            .apply(&TopologyOp::MarkDegraded {
                target: String::from("m1"),
            })
            .expect("mark degraded");
        assert_eq!(single_master.state(), TopologyState::Degraded);
        let err = single_master
            .check(&TopologyOp::JoinWorker {
                target: String::from("w1"),
                main: String::from("m1"),
            })
            .expect_err("degraded main");
        assert!(matches!(err, TopologyError::MainUnhealthy { .. }));
    }

    #[rstest]
    fn removals_need_a_healthy_survivor(mut single_master: ClusterTopology) {
        single_master
            .apply(&TopologyOp::JoinMaster {
                target: String::from("m2"),
                main: String::from("m1"),
            })
            .expect("join m2");
        single_master
            .apply(&TopologyOp::JoinWorker {
                target: String::from("w1"),
                main: String::from("m1"),
            })
            .expect("join w1");
        single_master
            .apply(&TopologyOp::MarkDegraded {
                target: String::from("m1"),
            })
            .expect("mark degraded");

        let via_degraded = [
            TopologyOp::DeleteMaster {
                target: String::from("m2"),
                main: Some(String::from("m1")),
            },
            TopologyOp::DeleteWorker {
                target: String::from("w1"),
                main: String::from("m1"),
            },
            TopologyOp::RemoveNode {
                target: String::from("w1"),
                main: String::from("m1"),
            },
        ];
        for op in &via_degraded {
            assert_eq!(
                single_master.check(op),
                Err(TopologyError::MainUnhealthy {
                    main_id: String::from("m1")
                }),
                "{op:?}"
            );
        }
        let via_healthy = TopologyOp::DeleteMaster {
            target: String::from("m1"),
            main: Some(String::from("m2")),
        };
        assert_eq!(single_master.check(&via_healthy), Ok(()));
    }

    #[rstest]
    fn rebuild_clears_the_degraded_mark(mut single_master: ClusterTopology) {
        single_master
            .apply(&TopologyOp::MarkDegraded {
                target: String::from("m1"),
            })
            .expect("mark degraded");
        let state = single_master
            .apply(&TopologyOp::RebuildFirstMaster {
                target: String::from("m1"),
            })
            .expect("rebuild first master");
        assert_eq!(state, TopologyState::SingleMaster);
        assert!(!single_master.is_degraded("m1"));
    }

    #[rstest]
    fn deleting_the_last_master_resets_the_first_master_slot(mut single_master: ClusterTopology) {
        single_master
            .apply(&TopologyOp::DeleteMaster {
                target: String::from("m1"),
                main: None,
            })
            .expect("delete m1");
        assert_eq!(single_master.first_master(), None);
        assert_eq!(single_master.state(), TopologyState::LoadBalancerReady);
        assert_eq!(single_master.check(&op_install_first("m2")), Ok(()));
    }

    #[rstest]
    fn first_master_slot_moves_to_a_survivor(mut single_master: ClusterTopology) {
        single_master
            .apply(&TopologyOp::JoinMaster {
                target: String::from("m2"),
                main: String::from("m1"),
            })
            .expect("join m2");
        single_master
            .apply(&TopologyOp::RemoveNode {
                target: String::from("m1"),
                main: String::from("m2"),
            })
            .expect("remove m1");
        assert_eq!(single_master.first_master(), Some("m2"));
    }

    #[test]
    fn seeding_skips_pending_records_and_marks_unhealthy_ones() {
        let chain = HopChain::direct(HopDescriptor::new("10.0.0.11", "root", "pw"));
        let server = |id: &str, role, status, key: Option<&str>| Server {
            id: id.to_owned(),
            name: id.to_owned(),
            infra_id: String::from("infra"),
            role,
            address: String::from("10.0.0.11"),
            port: 22,
            status,
            hop_chain: chain.clone(),
            join_command: None,
            certificate_key: key.map(str::to_owned),
            created_at: None,
            updated_at: None,
        };
        let servers = vec![
            server("m2", ServerRole::Master, ServerStatus::Active, None),
            server("m1", ServerRole::Master, ServerStatus::Active, Some("key")),
            server("w1", ServerRole::Worker, ServerStatus::Unhealthy, None),
            server("w2", ServerRole::Worker, ServerStatus::Pending, None),
        ];

        let book = ClusterTopology::from_servers(&servers);

        assert_eq!(book.first_master(), Some("m1"));
        assert_eq!(book.workers().collect::<Vec<_>>(), vec!["w1"]);
        assert!(book.is_degraded("w1"));
        assert_eq!(book.state(), TopologyState::Degraded);
    }
}
