//! Listings degrade to empty results; lookups and commands do not.

#[path = "common/cluster.rs"]
mod cluster;

use hopkube::{Category, ErrorClass, Request};
use rstest::rstest;

use cluster::cluster;

#[rstest]
#[case::infras("getInfras")]
#[case::servers("getServers")]
#[case::permissions("getInfraPermissions")]
#[case::users("getAllUsers")]
#[tokio::test]
async fn unreachable_listing_reads_as_empty(#[case] operation: &str) {
    let env = cluster();
    env.backend.seed_user("ops@example.com");
    env.backend.fail_transport(operation);
    let client = env.orchestrator.client();

    let count = match operation {
        "getInfras" => client.get_infras().await.map(|found| found.len()),
        "getServers" => client.get_servers(env.infra.clone()).await.map(|found| found.len()),
        "getInfraPermissions" => client
            .get_infra_permissions(env.infra.clone())
            .await
            .map(|found| found.len()),
        _ => client.get_all_users().await.map(|found| found.len()),
    }
    .unwrap_or_else(|err| panic!("{operation} should degrade: {err}"));

    assert_eq!(count, 0);
    assert_eq!(env.backend.calls_to(operation).len(), 1);
}

#[test]
fn every_listing_is_catalogued_as_such() {
    let listings: Vec<&str> = hopkube::CATALOG
        .iter()
        .filter(|(_, category)| *category == Category::Listing)
        .map(|(name, _)| *name)
        .collect();
    assert_eq!(
        listings,
        vec!["getInfras", "getServers", "getInfraPermissions", "getAllUsers"]
    );
}

#[rstest]
#[case::infra_lookup("getInfraById")]
#[case::server_lookup("getServerById")]
#[tokio::test]
async fn unreachable_lookup_propagates(#[case] operation: &str) {
    let env = cluster();
    env.backend.fail_transport(operation);
    let client = env.orchestrator.client();

    let err = if operation == "getInfraById" {
        client.get_infra(env.infra.clone()).await.map(drop)
    } else {
        client.get_server("server-1").await.map(drop)
    }
    .expect_err("lookups propagate transport failures");

    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn raw_listing_requests_report_the_failure() {
    let env = cluster();
    env.backend.reject("getServers", "registry offline");
    let request: Request = serde_json::from_value(serde_json::json!({
        "operation": "getServers",
        "payload": {"infraId": env.infra}
    }))
    .expect("decode request");

    let err = env
        .orchestrator
        .client()
        .send_raw(&request)
        .await
        .expect_err("raw requests propagate");
    assert_eq!(err.class(), ErrorClass::Transport);
    assert!(err.to_string().contains("registry offline"));
}
