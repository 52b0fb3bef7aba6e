//! Comparisons between registry records and the live cluster.
//!
//! Nothing here heals drift; the reports tell an operator which records and
//! nodes disagree so they can decide between a rebuild and a cleanup.

use crate::operation::ClusterNode;
use crate::registry::{Server, ServerRole, ServerStatus};
use crate::result::CommandResult;

/// Drift between registry records and the live node list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reconciliation {
    /// Registered cluster nodes the cluster does not report.
    pub missing_from_cluster: Vec<String>,
    /// Live nodes with no registry record.
    pub unregistered: Vec<String>,
    /// Registered nodes the cluster reports as not Ready.
    pub not_ready: Vec<String>,
}

impl Reconciliation {
    /// Whether registry and cluster agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_from_cluster.is_empty()
            && self.unregistered.is_empty()
            && self.not_ready.is_empty()
    }
}

fn holds_node(server: &Server) -> bool {
    matches!(server.role, ServerRole::Master | ServerRole::Worker)
        && !matches!(server.status, ServerStatus::Pending | ServerStatus::Detached)
}

fn matches_node(server: &Server, node: &ClusterNode) -> bool {
    node.name == server.name || node.internal_ip.as_deref() == Some(server.address.as_str())
}

/// Compares registered servers with the nodes reported by `calculateNodes`.
///
/// A server matches a node by node name or by internal address. Load
/// balancers and records that are not cluster members are ignored.
#[must_use]
pub fn reconcile(servers: &[Server], nodes: &[ClusterNode]) -> Reconciliation {
    let members: Vec<&Server> = servers.iter().filter(|server| holds_node(server)).collect();
    let mut report = Reconciliation::default();

    for server in &members {
        match nodes.iter().find(|node| matches_node(server, node)) {
            None => report.missing_from_cluster.push(server.id.clone()),
            Some(node) if !node.status.is_healthy() => report.not_ready.push(server.id.clone()),
            Some(_) => {}
        }
    }
    report.unregistered = nodes
        .iter()
        .filter(|node| !servers.iter().any(|server| matches_node(server, node)))
        .map(|node| node.name.clone())
        .collect();
    report
}

/// The stop and start halves of a `restartServer` result.
#[derive(Clone, Copy, Debug)]
pub struct RestartPhases<'a> {
    /// Result of powering off.
    pub stop: &'a CommandResult,
    /// Result of powering on.
    pub start: &'a CommandResult,
}

/// Splits a restart result into its phases when the backend reports them as
/// exactly two nested steps.
#[must_use]
pub fn restart_phases(result: &CommandResult) -> Option<RestartPhases<'_>> {
    match result.command_results.as_slice() {
        [stop, start] => Some(RestartPhases { stop, start }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::hops::{HopChain, HopDescriptor};
    use crate::operation::NodeHealth;

    fn server(id: &str, name: &str, address: &str, role: ServerRole) -> Server {
        Server {
            id: id.to_owned(),
            name: name.to_owned(),
            infra_id: String::from("infra"),
            role,
            address: address.to_owned(),
            port: 22,
            status: ServerStatus::Active,
            hop_chain: HopChain::direct(HopDescriptor::new(address, "root", "pw")),
            join_command: None,
            certificate_key: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn node(name: &str, ip: &str, status: NodeHealth) -> ClusterNode {
        ClusterNode {
            name: name.to_owned(),
            status,
            roles: Vec::new(),
            age: String::from("2d"),
            version: String::from("v1.30.2"),
            internal_ip: Some(ip.to_owned()),
        }
    }

    #[rstest]
    fn reports_each_kind_of_drift() {
        let servers = vec![
            server("m1", "master-1", "10.0.0.11", ServerRole::Master),
            server("w1", "worker-1", "10.0.0.21", ServerRole::Worker),
            server("w2", "worker-2", "10.0.0.22", ServerRole::Worker),
            server("lb1", "lb-1", "10.0.0.5", ServerRole::Loadbalancer),
        ];
        let nodes = vec![
            node("master-1", "10.0.0.11", NodeHealth::Ready),
            node("ip-10-0-0-21", "10.0.0.21", NodeHealth::NotReady),
            node("stray", "10.0.0.99", NodeHealth::Ready),
        ];

        let report = reconcile(&servers, &nodes);

        assert_eq!(report.missing_from_cluster, vec![String::from("w2")]);
        assert_eq!(report.not_ready, vec![String::from("w1")]);
        assert_eq!(report.unregistered, vec![String::from("stray")]);
        assert!(!report.is_clean());
    }

    #[rstest]
    fn restart_phases_need_two_steps() {
        let split = CommandResult::ok("restart")
            .with_steps(vec![CommandResult::ok("stop"), CommandResult::failed("start")]);
        let phases = restart_phases(&split).expect("two steps");
        assert!(phases.stop.success);
        assert!(!phases.start.success);
        assert!(restart_phases(&CommandResult::ok("restart")).is_none());
    }
}
