//! Shared cluster fixtures for scenario tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared helpers under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/cluster.rs"]
//! mod cluster;
//! ```
#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use std::sync::Arc;
use std::time::Duration;

use hopkube::test_support::InMemoryBackend;
use hopkube::{
    ClusterClient, ClusterOrchestrator, HopChain, HopDescriptor, InfraKind, NodeSpec, Peer,
    Server,
};

/// Privileged password used for every simulated node.
pub const SUDO: &str = "sudo-pw";

/// An orchestrator wired to an in-memory backend with one Kubernetes infra.
pub struct Cluster {
    pub backend: Arc<InMemoryBackend>,
    pub orchestrator: ClusterOrchestrator<Arc<InMemoryBackend>>,
    pub infra: String,
}

/// Servers of a bootstrapped HA cluster.
pub struct HaCluster {
    pub load_balancer: Server,
    pub first_master: Server,
    pub second_master: Server,
    pub worker: Server,
}

impl HaCluster {
    /// Peer handle for the load balancer.
    pub fn lb_peer(&self) -> Peer {
        Peer::new(self.load_balancer.id.clone(), SUDO)
    }

    /// Peer handle for the first master.
    pub fn main_peer(&self) -> Peer {
        Peer::new(self.first_master.id.clone(), SUDO)
    }
}

pub fn cluster() -> Cluster {
    build(None)
}

pub fn cluster_with_timeout(after: Duration) -> Cluster {
    build(Some(after))
}

fn build(timeout: Option<Duration>) -> Cluster {
    let backend = Arc::new(InMemoryBackend::new());
    let infra = backend.seed_infra("prod", InfraKind::Kubernetes);
    let client = ClusterClient::new(Arc::clone(&backend));
    let client = match timeout {
        Some(after) => client.with_operation_timeout(after),
        None => client,
    };
    Cluster {
        orchestrator: ClusterOrchestrator::new(client),
        backend,
        infra,
    }
}

/// Two-hop route to `host` through a shared bastion.
pub fn hops(host: &str) -> HopChain {
    HopChain::direct(HopDescriptor::new("bastion.example", "ops", "bastion-pw"))
        .through(HopDescriptor::new(host, "ubuntu", "node-pw"))
}

/// Node named after its host, as the cluster reports it.
pub fn spec(host: &str) -> NodeSpec {
    NodeSpec::new(host, hops(host), SUDO)
}

/// Bootstraps a load balancer, two masters, and one worker.
pub async fn bootstrap_ha(cluster: &Cluster) -> HaCluster {
    let orchestrator = &cluster.orchestrator;
    let load_balancer = orchestrator
        .install_load_balancer(&cluster.infra, "lb-1", hops("lb-1"))
        .await
        .unwrap_or_else(|err| panic!("install load balancer: {err}"));
    let lb = Peer::new(load_balancer.id.clone(), SUDO);
    let first_master = orchestrator
        .install_first_master(&cluster.infra, spec("master-1"), Some(&lb))
        .await
        .unwrap_or_else(|err| panic!("install first master: {err}"));
    let second_master = orchestrator
        .join_master(&cluster.infra, spec("master-2"), &first_master.id, &lb)
        .await
        .unwrap_or_else(|err| panic!("join master: {err}"));
    let worker = orchestrator
        .join_worker(&cluster.infra, spec("worker-1"), &first_master.id)
        .await
        .unwrap_or_else(|err| panic!("join worker: {err}"));
    HaCluster {
        load_balancer,
        first_master,
        second_master,
        worker,
    }
}
