//! Namespace, pod, and deployment operations against a running cluster.

#[path = "common/cluster.rs"]
mod cluster;

use hopkube::ErrorClass;
use hopkube::Server;
use hopkube::operation::{
    DeployKubernetes, GetPodLogs, GitCredentials, NamespaceRef, PodRef, RegistryCredentials,
};

use cluster::{bootstrap_ha, cluster};

fn deployment(master: &Server, token: &str) -> DeployKubernetes {
    DeployKubernetes {
        server_id: master.id.clone(),
        hops: master.hop_chain.clone(),
        namespace: Some(String::from("shop")),
        git: GitCredentials {
            repository_url: String::from("https://git.example.com/acme/storefront.git"),
            branch: Some(String::from("main")),
            username: String::from("deploy-bot"),
            token: token.into(),
        },
        registry: RegistryCredentials {
            url: String::from("registry.example.com"),
            username: String::from("deploy-bot"),
            password: "registry-pw".into(),
        },
    }
}

fn namespace(master: &Server, name: &str) -> NamespaceRef {
    NamespaceRef {
        server_id: master.id.clone(),
        hops: master.hop_chain.clone(),
        namespace: name.to_owned(),
    }
}

fn pod(master: &Server, name: &str) -> PodRef {
    PodRef {
        server_id: master.id.clone(),
        hops: master.hop_chain.clone(),
        namespace: String::from("shop"),
        pod_name: name.to_owned(),
    }
}

fn logs(master: &Server, tail_lines: Option<u32>) -> GetPodLogs {
    GetPodLogs {
        server_id: master.id.clone(),
        hops: master.hop_chain.clone(),
        namespace: String::from("shop"),
        pod_name: String::from("storefront-0"),
        tail_lines,
    }
}

#[tokio::test]
async fn deployed_pod_lives_and_dies_through_the_api() {
    let env = cluster();
    let ha = bootstrap_ha(&env).await;
    let master = &ha.first_master;
    let client = env.orchestrator.client();

    let deployed = client
        .deploy_kubernetes(deployment(master, "git-token"))
        .await
        .expect("deploy");
    assert!(deployed.success);

    let status = client
        .get_namespace_status(namespace(master, "shop"))
        .await
        .expect("namespace");
    assert_eq!(status.pods.len(), 1);
    let running = client
        .get_pod_status(pod(master, "storefront-0"))
        .await
        .expect("pod");
    assert_eq!(running.phase, "Running");
    assert_eq!(running.node.as_deref(), Some("worker-1"));

    client
        .restart_pod(pod(master, "storefront-0"))
        .await
        .expect("restart pod");
    let restarted = client
        .get_pod_status(pod(master, "storefront-0"))
        .await
        .expect("pod");
    assert_eq!(restarted.restarts, 1);

    let tail = client
        .get_pod_logs(logs(master, Some(2)))
        .await
        .expect("logs");
    assert_eq!(tail.body().map(|body| body.lines().count()), Some(2));

    client
        .delete_pod(pod(master, "storefront-0"))
        .await
        .expect("delete pod");
    let gone = client.get_pod_logs(logs(master, None)).await.expect("logs");
    assert!(!gone.pod_exists);
    assert_eq!(gone.body(), None);
}

#[tokio::test]
async fn missing_namespaces_fail_by_category() {
    let env = cluster();
    let ha = bootstrap_ha(&env).await;
    let client = env.orchestrator.client();

    let delete = client
        .delete_namespace(namespace(&ha.first_master, "ghost"))
        .await
        .expect_err("nothing to delete");
    assert_eq!(delete.class(), ErrorClass::Domain);

    let lookup = client
        .get_namespace_status(namespace(&ha.first_master, "ghost"))
        .await
        .expect_err("nothing to read");
    assert_eq!(lookup.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn blank_git_token_is_rejected_before_dispatch() {
    let env = cluster();
    let ha = bootstrap_ha(&env).await;
    let before = env.backend.call_count();

    let err = env
        .orchestrator
        .client()
        .deploy_kubernetes(deployment(&ha.first_master, "  "))
        .await
        .expect_err("blank token");

    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(env.backend.call_count(), before);
}
