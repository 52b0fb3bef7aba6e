//! Unit tests for the orchestrator's book keeping and pending records.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::error::ErrorClass;
use crate::hops::HopDescriptor;
use crate::registry::InfraKind;
use crate::test_support::InMemoryBackend;
use crate::topology::{TopologyError, TopologyState};

struct Harness {
    backend: Arc<InMemoryBackend>,
    orchestrator: ClusterOrchestrator<Arc<InMemoryBackend>>,
    infra: String,
}

fn harness_with_timeout(timeout: Option<Duration>) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let infra = backend.seed_infra("prod", InfraKind::Kubernetes);
    let client = ClusterClient::new(Arc::clone(&backend));
    let client = match timeout {
        Some(after) => client.with_operation_timeout(after),
        None => client,
    };
    Harness {
        orchestrator: ClusterOrchestrator::new(client),
        backend,
        infra,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with_timeout(None)
}

fn spec(host: &str) -> NodeSpec {
    let hops = HopChain::direct(HopDescriptor::new("bastion.example", "ops", "bastion-pw"))
        .through(HopDescriptor::new(host, "ubuntu", "node-pw"));
    NodeSpec::new(host, hops, "sudo-pw")
}

#[rstest]
#[tokio::test]
async fn first_master_is_registered_with_join_material(harness: Harness) {
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");

    assert_eq!(master.status, ServerStatus::Active);
    assert!(master.join_command.is_some());
    assert!(master.is_first_master());

    let book = harness
        .orchestrator
        .topology(&harness.infra)
        .await
        .expect("book");
    assert_eq!(book.state(), TopologyState::SingleMaster);
    assert_eq!(book.first_master(), Some(master.id.as_str()));
}

#[rstest]
#[tokio::test]
async fn failed_command_leaves_book_and_registry_untouched(harness: Harness) {
    harness
        .backend
        .fail_command("installFirstMaster", CommandResult::failed("kubeadm init exited 1"));

    let err = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect_err("remote failure");

    assert!(err.is_domain());
    let book = harness
        .orchestrator
        .topology(&harness.infra)
        .await
        .expect("book");
    assert_eq!(book.state(), TopologyState::Empty);
    let servers = harness
        .orchestrator
        .client()
        .get_servers(harness.infra.clone())
        .await
        .expect("list");
    assert!(servers.is_empty());
}

#[rstest]
#[tokio::test]
async fn book_load_propagates_registry_failures(harness: Harness) {
    harness.backend.reject("getServers", "registry offline");
    let err = harness
        .orchestrator
        .topology(&harness.infra)
        .await
        .expect_err("unreadable registry");
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[rstest]
#[tokio::test]
async fn forget_reloads_the_book_from_the_registry(harness: Harness) {
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");

    harness.orchestrator.forget(&harness.infra);
    let book = harness
        .orchestrator
        .topology(&harness.infra)
        .await
        .expect("reloaded");

    assert_eq!(book.first_master(), Some(master.id.as_str()));
    assert_eq!(harness.backend.calls_to("getServers").len(), 2);
}

#[rstest]
#[tokio::test]
async fn guard_rejection_sends_nothing_remote(harness: Harness) {
    harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");

    let err = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-2"), None)
        .await
        .expect_err("already bootstrapped");

    assert!(matches!(
        err,
        ClusterError::Topology(TopologyError::AlreadyBootstrapped { .. })
    ));
    assert_eq!(harness.backend.calls_to("installFirstMaster").len(), 1);
}

#[tokio::test]
async fn timed_out_join_is_pending_and_blocks_the_same_address() {
    let harness = harness_with_timeout(Some(Duration::from_millis(50)));
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");
    harness.backend.stall("joinWorker");

    let err = harness
        .orchestrator
        .join_worker(&harness.infra, spec("worker-1"), &master.id)
        .await
        .expect_err("timeout");
    assert_eq!(err.class(), ErrorClass::Timeout);

    let retry = harness
        .orchestrator
        .join_worker(&harness.infra, spec("worker-1"), &master.id)
        .await
        .expect_err("blocked while unknown");
    assert!(matches!(retry, ClusterError::OutcomeUnknown { .. }));
    assert_eq!(harness.backend.calls_to("joinWorker").len(), 1);
}

#[rstest]
#[tokio::test]
async fn rejoining_a_member_address_is_rejected_locally(harness: Harness) {
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");
    let worker = harness
        .orchestrator
        .join_worker(&harness.infra, spec("worker-1"), &master.id)
        .await
        .expect("join");

    let err = harness
        .orchestrator
        .join_worker(&harness.infra, spec("worker-1"), &master.id)
        .await
        .expect_err("already a member");

    assert!(matches!(
        err,
        ClusterError::Topology(TopologyError::AlreadyMember { ref server_id }) if *server_id == worker.id
    ));
    assert_eq!(harness.backend.calls_to("joinWorker").len(), 1);
}

#[tokio::test]
async fn timeout_names_the_server_to_verify() {
    let harness = harness_with_timeout(Some(Duration::from_millis(50)));
    harness.backend.stall("installFirstMaster");

    let err = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect_err("timeout");

    let ClusterError::Timeout {
        server_id: Some(server_id),
        ..
    } = err
    else {
        panic!("expected a timeout naming the server, got {err}");
    };
    assert!(harness.orchestrator.pending_operation(&server_id).is_some());
}

#[tokio::test]
async fn unobservable_operations_leave_no_pending_record() {
    let harness = harness_with_timeout(Some(Duration::from_millis(50)));
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");
    harness.backend.stall("renewCertificate");

    let err = harness
        .orchestrator
        .renew_certificate(&master.id)
        .await
        .expect_err("timeout");

    assert_eq!(err.class(), ErrorClass::Timeout);
    assert!(matches!(err, ClusterError::Timeout { server_id: None, .. }));
    assert!(harness.orchestrator.pending_operation(&master.id).is_none());
}

#[rstest]
#[tokio::test]
async fn observation_marks_a_member_degraded(harness: Harness) {
    let master = harness
        .orchestrator
        .install_first_master(&harness.infra, spec("master-1"), None)
        .await
        .expect("install");
    harness.backend.mark_unhealthy(&master.id);

    let status = harness
        .orchestrator
        .observe_node(&master.id)
        .await
        .expect("observe");

    assert!(!status.status.is_healthy());
    let book = harness
        .orchestrator
        .topology(&harness.infra)
        .await
        .expect("book");
    assert_eq!(book.state(), TopologyState::Degraded);
    let record = harness
        .orchestrator
        .client()
        .get_server(master.id.clone())
        .await
        .expect("record");
    assert_eq!(record.status, ServerStatus::Unhealthy);
}

#[rstest]
#[tokio::test]
async fn verify_without_a_record_reports_nothing_pending(harness: Harness) {
    let outcome = harness
        .orchestrator
        .verify_pending("unknown")
        .await
        .expect("verify");
    assert_eq!(outcome, Verification::NothingPending);
    assert_eq!(harness.backend.call_count(), 0);
}
