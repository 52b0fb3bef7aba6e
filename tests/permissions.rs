//! Role checks applied before topology changes.

#[path = "common/cluster.rs"]
mod cluster;

use std::sync::Arc;

use hopkube::operation::SetInfraPermission;
use hopkube::test_support::InMemoryBackend;
use hopkube::{ClusterClient, ClusterError, ClusterOrchestrator, ErrorClass, PermissionRole};

use cluster::{cluster, spec};

fn acting(
    backend: &Arc<InMemoryBackend>,
    user_id: &str,
) -> ClusterOrchestrator<Arc<InMemoryBackend>> {
    ClusterOrchestrator::new(ClusterClient::new(Arc::clone(backend))).acting_as(user_id)
}

#[tokio::test]
async fn user_without_a_grant_changes_nothing() {
    let env = cluster();
    let stranger = env.backend.seed_user("stranger@example.com");

    let err = acting(&env.backend, &stranger)
        .install_first_master(&env.infra, spec("master-1"), None)
        .await
        .expect_err("no grant");

    assert!(matches!(err, ClusterError::PermissionDenied { .. }));
    assert_eq!(err.class(), ErrorClass::Permission);
    assert!(env.backend.calls_to("installFirstMaster").is_empty());
}

#[tokio::test]
async fn members_observe_and_admins_change_topology() {
    let env = cluster();
    let member = env.backend.seed_user("dev@example.com");
    let admin = env.backend.seed_user("ops@example.com");
    env.backend.grant(&env.infra, &member, PermissionRole::Member);
    env.backend.grant(&env.infra, &admin, PermissionRole::Admin);

    let as_admin = acting(&env.backend, &admin);
    let master = as_admin
        .install_first_master(&env.infra, spec("master-1"), None)
        .await
        .expect("admin installs");

    let as_member = acting(&env.backend, &member);
    let status = as_member
        .observe_node(&master.id)
        .await
        .expect("member observes");
    assert!(status.status.is_healthy());

    let err = as_member
        .join_worker(&env.infra, spec("worker-1"), &master.id)
        .await
        .expect_err("member cannot join nodes");
    assert!(matches!(err, ClusterError::PermissionDenied { .. }));
    assert!(env.backend.calls_to("joinWorker").is_empty());
}

#[tokio::test]
async fn grants_are_managed_through_the_client() {
    let env = cluster();
    let user = env.backend.seed_user("dev@example.com");
    let client = env.orchestrator.client();

    let granted = client
        .set_infra_permission(SetInfraPermission {
            infra_id: env.infra.clone(),
            user_id: user.clone(),
            role: PermissionRole::Member,
        })
        .await
        .expect("grant");
    assert_eq!(granted.user_email, "dev@example.com");

    let promoted = client
        .set_infra_permission(SetInfraPermission {
            infra_id: env.infra.clone(),
            user_id: user.clone(),
            role: PermissionRole::Admin,
        })
        .await
        .expect("promote");
    assert_eq!(promoted.role, PermissionRole::Admin);
    let grants = client
        .get_infra_permissions(env.infra.clone())
        .await
        .expect("grants");
    assert_eq!(grants.len(), 1);

    client
        .remove_infra_permission(env.infra.clone(), user.clone())
        .await
        .expect("revoke");
    let err = client
        .authorize(&user, &env.infra, PermissionRole::Member)
        .await
        .expect_err("revoked");
    assert_eq!(err.class(), ErrorClass::Permission);

    let users = client.get_all_users().await.expect("users");
    assert!(users.iter().any(|known| known.id == user));
}
