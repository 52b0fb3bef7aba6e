//! Test support utilities shared across unit and integration tests.
//!
//! [`InMemoryBackend`] stands in for the remote execution backend: it keeps
//! a registry and a simulated cluster per infra, records every request, and
//! can be told to fail, delay, or stall individual operations.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::error::TransportError;
use crate::hops::HopChain;
use crate::operation::{
    CalculateNodes, CalculateResources, ClusterNode, ClusterResources, CreateServer,
    DeleteNamespace, DeletePod, GetNamespaceStatus, GetNodeStatus, GetPodLogs, GetPodStatus,
    NamespaceRef, NamespaceStatus, NodeHealth, NodeStatus, NodeTarget, PodLogs, PodRef, PodStatus,
    RebuildFirstMaster, RebuildHa, RebuildMaster, RebuildWorker, RenewCertificate, Request,
    ResourceUsage, RestartPod, RestartServer, StartServer, StopServer,
};
use crate::registry::{
    Infra, InfraKind, Permission, PermissionRole, Server, ServerDraft, ServerRole, User,
};
use crate::result::CommandResult;
use crate::transport::{Envelope, Transport, TransportFuture};

const CPU_PER_NODE: u64 = 4000;
const MEMORY_PER_NODE: u64 = 8 * 1024 * 1024 * 1024;
const PODS_PER_NODE: u64 = 110;
const KUBE_VERSION: &str = "v1.30.2";

/// Injected behaviour for one operation name.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// The request never reaches the backend.
    Unreachable,
    /// The backend answers with a failed envelope.
    Reject(String),
    /// The backend runs the command and reports this result instead.
    CommandFailure(CommandResult),
    /// The backend applies the request, then answers after the delay.
    Delay(Duration),
    /// The backend never answers and never applies the request.
    Stall,
}

#[derive(Clone, Debug)]
struct SimNode {
    name: String,
    address: String,
    role: ServerRole,
    ready: bool,
    powered: bool,
}

#[derive(Clone, Debug, Default)]
struct SimCluster {
    load_balancers: BTreeSet<String>,
    first_master: Option<String>,
    nodes: BTreeMap<String, SimNode>,
    namespaces: BTreeMap<String, Vec<PodStatus>>,
}

impl SimCluster {
    fn node_by_name(&self, name: &str) -> Option<String> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id.clone())
    }

    fn drop_node(&mut self, server_id: &str) -> bool {
        if self.nodes.remove(server_id).is_none() {
            return false;
        }
        if self.first_master.as_deref() == Some(server_id) {
            self.first_master = self
                .nodes
                .iter()
                .find(|(_, node)| node.role == ServerRole::Master)
                .map(|(id, _)| id.clone());
        }
        true
    }

    fn worker_name(&self) -> Option<String> {
        self.nodes
            .values()
            .find(|node| node.role == ServerRole::Worker)
            .or_else(|| self.nodes.values().next())
            .map(|node| node.name.clone())
    }
}

#[derive(Debug, Default)]
struct BackendState {
    infras: BTreeMap<String, Infra>,
    servers: BTreeMap<String, Server>,
    permissions: BTreeMap<String, Vec<Permission>>,
    users: BTreeMap<String, User>,
    clusters: BTreeMap<String, SimCluster>,
    calls: Vec<Request>,
    faults: BTreeMap<String, Fault>,
    next_id: u64,
}

impl BackendState {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Infra whose simulated cluster contains `server_id`.
    fn infra_of(&self, server_id: &str) -> Option<String> {
        self.clusters
            .iter()
            .find(|(_, cluster)| {
                cluster.nodes.contains_key(server_id) || cluster.load_balancers.contains(server_id)
            })
            .map(|(infra, _)| infra.clone())
    }

    /// Infra of a master that can hand out join material.
    fn infra_of_master(&self, main_id: &str) -> Option<String> {
        self.clusters
            .iter()
            .find(|(_, cluster)| {
                cluster
                    .nodes
                    .get(main_id)
                    .is_some_and(|node| node.role == ServerRole::Master && node.ready)
            })
            .map(|(infra, _)| infra.clone())
    }

    fn node_mut(&mut self, server_id: &str) -> Option<&mut SimNode> {
        self.clusters
            .values_mut()
            .find_map(|cluster| cluster.nodes.get_mut(server_id))
    }

    fn cluster_of_mut(&mut self, server_id: &str) -> Option<&mut SimCluster> {
        let infra = self.infra_of(server_id)?;
        self.clusters.get_mut(&infra)
    }
}

/// In-process stand-in for the execution backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an infra record and returns its id.
    pub fn seed_infra(&self, name: &str, kind: InfraKind) -> String {
        let mut state = self.state();
        let id = state.mint("infra");
        let now = Utc::now();
        state.infras.insert(
            id.clone(),
            Infra {
                id: id.clone(),
                name: name.to_owned(),
                kind,
                info: json!({}),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Adds a user and returns its id.
    pub fn seed_user(&self, email: &str) -> String {
        let mut state = self.state();
        let id = state.mint("user");
        state.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                email: email.to_owned(),
                name: None,
            },
        );
        id
    }

    /// Grants `role` on `infra_id` to an existing user.
    pub fn grant(&self, infra_id: &str, user_id: &str, role: PermissionRole) {
        let mut state = self.state();
        let email = state
            .users
            .get(user_id)
            .map(|user| user.email.clone())
            .unwrap_or_default();
        upsert_permission(&mut state, infra_id, user_id, &email, role);
    }

    /// Adds a pod to a namespace of the cluster in `infra_id`.
    pub fn seed_pod(&self, infra_id: &str, namespace: &str, pod_name: &str) {
        let mut state = self.state();
        let cluster = state.clusters.entry(infra_id.to_owned()).or_default();
        let node = cluster.worker_name();
        cluster
            .namespaces
            .entry(namespace.to_owned())
            .or_default()
            .push(running_pod(pod_name, namespace, node));
    }

    /// Makes `operation` fail before reaching the backend.
    pub fn fail_transport(&self, operation: &str) {
        self.inject(operation, Fault::Unreachable);
    }

    /// Makes the backend reject `operation` with `message`.
    pub fn reject(&self, operation: &str, message: &str) {
        self.inject(operation, Fault::Reject(message.to_owned()));
    }

    /// Makes the backend report `result` for `operation`.
    pub fn fail_command(&self, operation: &str, result: CommandResult) {
        self.inject(operation, Fault::CommandFailure(result));
    }

    /// Applies `operation` but answers only after `delay`.
    pub fn delay(&self, operation: &str, delay: Duration) {
        self.inject(operation, Fault::Delay(delay));
    }

    /// Makes `operation` hang without being applied.
    pub fn stall(&self, operation: &str) {
        self.inject(operation, Fault::Stall);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    fn inject(&self, operation: &str, fault: Fault) {
        self.state().faults.insert(operation.to_owned(), fault);
    }

    /// Makes a live node report NotReady.
    pub fn mark_unhealthy(&self, server_id: &str) {
        if let Some(node) = self.state().node_mut(server_id) {
            node.ready = false;
        }
    }

    /// Makes a live node report Ready again.
    pub fn mark_healthy(&self, server_id: &str) {
        if let Some(node) = self.state().node_mut(server_id) {
            node.ready = true;
            node.powered = true;
        }
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Request> {
        self.state().calls.clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Requests received for one operation name.
    #[must_use]
    pub fn calls_to(&self, operation: &str) -> Vec<Request> {
        self.state()
            .calls
            .iter()
            .filter(|request| request.name() == operation)
            .cloned()
            .collect()
    }

    /// Names of the live nodes in the cluster of `infra_id`.
    #[must_use]
    pub fn node_names(&self, infra_id: &str) -> Vec<String> {
        self.state()
            .clusters
            .get(infra_id)
            .map(|cluster| cluster.nodes.values().map(|node| node.name.clone()).collect())
            .unwrap_or_default()
    }

    fn record(&self, request: &Request) -> Option<Fault> {
        let mut state = self.state();
        state.calls.push(request.clone());
        state.faults.get(request.name()).cloned()
    }

    async fn respond(&self, request: &Request) -> Result<Envelope, TransportError> {
        match self.record(request) {
            Some(Fault::Unreachable) => Err(TransportError::Unreachable(format!(
                "connection refused while sending {}",
                request.name()
            ))),
            Some(Fault::Reject(message)) => Ok(Envelope::rejected(message)),
            Some(Fault::CommandFailure(result)) => Ok(to_envelope(&result)),
            Some(Fault::Delay(delay)) => {
                let envelope = self.handle(request);
                tokio::time::sleep(delay).await;
                Ok(envelope)
            }
            Some(Fault::Stall) => std::future::pending().await,
            None => Ok(self.handle(request)),
        }
    }

    fn handle(&self, request: &Request) -> Envelope {
        let mut state = self.state();
        match request {
            Request::InstallLoadBalancer(install) => {
                let cluster = state.clusters.entry(install.infra_id.clone()).or_default();
                cluster.load_balancers.insert(install.server_id.clone());
                command(
                    CommandResult::ok("load balancer installed")
                        .with_steps(steps(&["install haproxy", "configure frontend"])),
                )
            }
            Request::InstallFirstMaster(install)
            | Request::RebuildFirstMaster(RebuildFirstMaster(install)) => {
                let rebuilding = matches!(request, Request::RebuildFirstMaster(_));
                let cluster = state.clusters.entry(install.infra_id.clone()).or_default();
                if !rebuilding && cluster.first_master.is_some() {
                    return command(CommandResult::failed(
                        "cluster already initialised; kubeadm init refused to run",
                    ));
                }
                let host = target_host(&install.hops);
                let node = cluster
                    .nodes
                    .entry(install.server_id.clone())
                    .or_insert_with(|| sim_node(&host, ServerRole::Master));
                node.ready = true;
                node.powered = true;
                cluster.first_master = Some(install.server_id.clone());
                command(
                    CommandResult::ok("control plane initialised")
                        .with_steps(steps(&["preflight", "kubeadm init", "install cni"]))
                        .with_details(json!({
                            "joinCommand": format!(
                                "kubeadm join {host}:6443 --token abcdef.0123456789abcdef"
                            ),
                            "certificateKey": format!("certkey-{}", install.server_id),
                        })),
                )
            }
            Request::JoinMaster(join) | Request::RebuildMaster(RebuildMaster(join)) => {
                let Some(infra) = state.infra_of_master(&join.main_id) else {
                    return command(main_missing(&join.main_id));
                };
                join_node(&mut state, &infra, &join.server_id, &join.hops, ServerRole::Master)
            }
            Request::JoinWorker(join) | Request::RebuildWorker(RebuildWorker(join)) => {
                let Some(infra) = state.infra_of_master(&join.main_id) else {
                    return command(main_missing(&join.main_id));
                };
                join_node(&mut state, &infra, &join.server_id, &join.hops, ServerRole::Worker)
            }
            Request::RebuildHa(RebuildHa(install)) => {
                let known = state
                    .clusters
                    .get(&install.infra_id)
                    .is_some_and(|cluster| cluster.load_balancers.contains(&install.server_id));
                if known {
                    command(CommandResult::ok("load balancer backends refreshed"))
                } else {
                    command(CommandResult::failed(format!(
                        "{} is not a load balancer of this cluster",
                        install.server_id
                    )))
                }
            }
            Request::DeleteMaster(delete) => remove_member(&mut state, &delete.server_id),
            Request::DeleteWorker(delete) => remove_member(&mut state, &delete.server_id),
            Request::RemoveNode(remove) => {
                let Some(cluster) = state.cluster_of_mut(&remove.server_id) else {
                    return command(CommandResult::failed(format!(
                        "{} is not part of a cluster",
                        remove.server_id
                    )));
                };
                match cluster.node_by_name(&remove.node_name) {
                    Some(id) => {
                        cluster.drop_node(&id);
                        command(CommandResult::ok(format!("node {} removed", remove.node_name)))
                    }
                    None => command(CommandResult::failed(format!(
                        "nodes \"{}\" not found",
                        remove.node_name
                    ))),
                }
            }
            Request::GetNodeStatus(GetNodeStatus(target)) => {
                node_status(&mut state, target)
            }
            Request::CalculateNodes(CalculateNodes(target)) => {
                match state.infra_of(&target.server_id).and_then(|infra| state.clusters.get(&infra)) {
                    Some(cluster) => to_envelope(&cluster_nodes(cluster)),
                    None => not_in_cluster(&target.server_id),
                }
            }
            Request::CalculateResources(CalculateResources(target)) => {
                match state.infra_of(&target.server_id).and_then(|infra| state.clusters.get(&infra)) {
                    Some(cluster) => to_envelope(&cluster_resources(cluster)),
                    None => not_in_cluster(&target.server_id),
                }
            }
            Request::RenewCertificate(RenewCertificate(target)) => {
                let is_master = state
                    .node_mut(&target.server_id)
                    .is_some_and(|node| node.role == ServerRole::Master);
                if is_master {
                    command(
                        CommandResult::ok("certificates renewed")
                            .with_steps(steps(&["kubeadm certs renew all", "restart control plane"])),
                    )
                } else {
                    command(CommandResult::failed(format!(
                        "{} is not a control-plane node",
                        target.server_id
                    )))
                }
            }
            Request::StartServer(StartServer(target)) => {
                set_power(&mut state, target, true);
                command(CommandResult::ok("server started"))
            }
            Request::StopServer(StopServer(target)) => {
                set_power(&mut state, target, false);
                command(CommandResult::ok("server stopped"))
            }
            Request::RestartServer(RestartServer(target)) => {
                set_power(&mut state, target, true);
                command(
                    CommandResult::ok("server restarted")
                        .with_steps(steps(&["stop server", "start server"])),
                )
            }
            Request::GetNamespaceStatus(GetNamespaceStatus(namespace)) => {
                namespace_status(&mut state, namespace)
            }
            Request::DeleteNamespace(DeleteNamespace(namespace)) => {
                let removed = state
                    .cluster_of_mut(&namespace.server_id)
                    .and_then(|cluster| cluster.namespaces.remove(&namespace.namespace));
                match removed {
                    Some(_) => command(CommandResult::ok(format!(
                        "namespace \"{}\" deleted",
                        namespace.namespace
                    ))),
                    None => command(CommandResult::failed(format!(
                        "namespaces \"{}\" not found",
                        namespace.namespace
                    ))),
                }
            }
            Request::GetPodStatus(GetPodStatus(pod)) => {
                match find_pod(&mut state, pod) {
                    Some(found) => to_envelope(&*found),
                    None => Envelope::rejected(format!("pods \"{}\" not found", pod.pod_name)),
                }
            }
            Request::RestartPod(RestartPod(pod)) => match find_pod(&mut state, pod) {
                Some(found) => {
                    found.restarts = found.restarts.saturating_add(1);
                    command(CommandResult::ok(format!("pod \"{}\" restarted", pod.pod_name)))
                }
                None => command(CommandResult::failed(format!(
                    "pods \"{}\" not found",
                    pod.pod_name
                ))),
            },
            Request::DeletePod(DeletePod(pod)) => {
                let removed = state
                    .cluster_of_mut(&pod.server_id)
                    .and_then(|cluster| cluster.namespaces.get_mut(&pod.namespace))
                    .is_some_and(|pods| {
                        let before = pods.len();
                        pods.retain(|existing| existing.name != pod.pod_name);
                        pods.len() < before
                    });
                if removed {
                    command(CommandResult::ok(format!("pod \"{}\" deleted", pod.pod_name)))
                } else {
                    command(CommandResult::failed(format!(
                        "pods \"{}\" not found",
                        pod.pod_name
                    )))
                }
            }
            Request::GetPodLogs(request) => to_envelope(&pod_logs(&mut state, request)),
            Request::DeployKubernetes(deploy) => {
                let namespace = deploy
                    .namespace
                    .clone()
                    .unwrap_or_else(|| String::from("default"));
                let app = app_name(&deploy.git.repository_url);
                let Some(cluster) = state.cluster_of_mut(&deploy.server_id) else {
                    return command(CommandResult::failed(format!(
                        "{} is not part of a cluster",
                        deploy.server_id
                    )));
                };
                let node = cluster.worker_name();
                let pods = cluster.namespaces.entry(namespace.clone()).or_default();
                let pod_name = format!("{app}-0");
                pods.retain(|existing| existing.name != pod_name);
                pods.push(running_pod(&pod_name, &namespace, node));
                command(
                    CommandResult::ok(format!("deployed {app} to {namespace}")).with_steps(
                        steps(&["clone repository", "build image", "push image", "apply manifests"]),
                    ),
                )
            }
            Request::CreateInfra(create) => {
                let id = state.mint("infra");
                let now = Utc::now();
                let infra = Infra {
                    id: id.clone(),
                    name: create.name.clone(),
                    kind: create.kind,
                    info: create.info.clone(),
                    created_at: now,
                    updated_at: now,
                };
                state.infras.insert(id, infra.clone());
                to_envelope(&infra)
            }
            Request::UpdateInfra(update) => match state.infras.get_mut(&update.id) {
                Some(infra) => {
                    if let Some(name) = &update.name {
                        infra.name.clone_from(name);
                    }
                    if let Some(kind) = update.kind {
                        infra.kind = kind;
                    }
                    if let Some(info) = &update.info {
                        infra.info = info.clone();
                    }
                    infra.updated_at = Utc::now();
                    to_envelope(&*infra)
                }
                None => Envelope::rejected(format!("infra {} not found", update.id)),
            },
            Request::DeleteInfra(delete) => {
                state.infras.remove(&delete.id);
                state.permissions.remove(&delete.id);
                state.servers.retain(|_, server| server.infra_id != delete.id);
                Envelope::ok(json!({}))
            }
            Request::GetInfraById(lookup) => to_envelope(&state.infras.get(&lookup.id)),
            Request::GetInfras(_) => {
                to_envelope(&state.infras.values().cloned().collect::<Vec<_>>())
            }
            Request::CreateServer(CreateServer(draft)) => {
                create_server(&mut state, draft)
            }
            Request::UpdateServer(update) => match state.servers.get_mut(&update.id) {
                Some(server) => {
                    update.patch.apply_to(server);
                    server.updated_at = Some(Utc::now());
                    to_envelope(&*server)
                }
                None => Envelope::rejected(format!("server {} not found", update.id)),
            },
            Request::DeleteServer(delete) => {
                state.servers.remove(&delete.id);
                Envelope::ok(json!({}))
            }
            Request::GetServerById(lookup) => to_envelope(&state.servers.get(&lookup.id)),
            Request::GetServers(list) => to_envelope(
                &state
                    .servers
                    .values()
                    .filter(|server| server.infra_id == list.infra_id)
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
            Request::GetInfraPermissions(list) => to_envelope(
                &state
                    .permissions
                    .get(&list.infra_id)
                    .cloned()
                    .unwrap_or_default(),
            ),
            Request::SetInfraPermission(grant) => {
                let Some(email) = state.users.get(&grant.user_id).map(|user| user.email.clone())
                else {
                    return Envelope::rejected(format!("user {} not found", grant.user_id));
                };
                let permission =
                    upsert_permission(&mut state, &grant.infra_id, &grant.user_id, &email, grant.role);
                to_envelope(&permission)
            }
            Request::RemoveInfraPermission(revoke) => {
                if let Some(grants) = state.permissions.get_mut(&revoke.infra_id) {
                    grants.retain(|grant| grant.user_id != revoke.user_id);
                }
                Envelope::ok(json!({}))
            }
            Request::GetAllUsers(_) => {
                to_envelope(&state.users.values().cloned().collect::<Vec<_>>())
            }
        }
    }
}

impl Transport for InMemoryBackend {
    fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
        Box::pin(self.respond(request))
    }
}

fn to_envelope<T: Serialize + ?Sized>(value: &T) -> Envelope {
    match serde_json::to_value(value) {
        Ok(data) => Envelope::ok(data),
        Err(err) => Envelope::rejected(err.to_string()),
    }
}

fn command(result: CommandResult) -> Envelope {
    to_envelope(&result)
}

fn steps(names: &[&str]) -> Vec<CommandResult> {
    names.iter().map(|name| CommandResult::ok(*name)).collect()
}

fn main_missing(main_id: &str) -> CommandResult {
    CommandResult::failed(format!(
        "main master '{main_id}' is not a ready control-plane node"
    ))
}

fn not_in_cluster(server_id: &str) -> Envelope {
    Envelope::rejected(format!("server {server_id} is not part of a cluster"))
}

fn target_host(hops: &HopChain) -> String {
    hops.target().map(|hop| hop.host.clone()).unwrap_or_default()
}

fn sim_node(host: &str, role: ServerRole) -> SimNode {
    SimNode {
        name: host.to_owned(),
        address: host.to_owned(),
        role,
        ready: true,
        powered: true,
    }
}

fn join_node(
    state: &mut BackendState,
    infra_id: &str,
    server_id: &str,
    hops: &HopChain,
    role: ServerRole,
) -> Envelope {
    let host = target_host(hops);
    let cluster = state.clusters.entry(infra_id.to_owned()).or_default();
    let node = cluster
        .nodes
        .entry(server_id.to_owned())
        .or_insert_with(|| sim_node(&host, role));
    node.ready = true;
    node.powered = true;
    command(
        CommandResult::ok(format!("{host} joined as {role}"))
            .with_steps(steps(&["preflight", "kubeadm join"])),
    )
}

fn remove_member(state: &mut BackendState, server_id: &str) -> Envelope {
    let removed = state
        .cluster_of_mut(server_id)
        .is_some_and(|cluster| cluster.drop_node(server_id));
    if removed {
        command(
            CommandResult::ok(format!("{server_id} removed from the cluster"))
                .with_steps(steps(&["drain node", "kubeadm reset", "delete node"])),
        )
    } else {
        command(CommandResult::failed(format!(
            "{server_id} is not part of a cluster"
        )))
    }
}

fn health(node: &SimNode) -> NodeHealth {
    match (node.powered, node.ready) {
        (false, _) => NodeHealth::Unreachable,
        (true, true) => NodeHealth::Ready,
        (true, false) => NodeHealth::NotReady,
    }
}

fn node_status(state: &mut BackendState, target: &NodeTarget) -> Envelope {
    let status = state.node_mut(&target.server_id).map_or(
        NodeStatus {
            status: NodeHealth::Unknown,
            last_checked: Utc::now(),
            message: Some(String::from("node is not part of a cluster")),
        },
        |node| NodeStatus {
            status: health(node),
            last_checked: Utc::now(),
            message: None,
        },
    );
    to_envelope(&status)
}

fn cluster_nodes(cluster: &SimCluster) -> Vec<ClusterNode> {
    cluster
        .nodes
        .values()
        .map(|node| ClusterNode {
            name: node.name.clone(),
            status: health(node),
            roles: match node.role {
                ServerRole::Master => vec![String::from("control-plane")],
                _ => Vec::new(),
            },
            age: String::from("1d"),
            version: KUBE_VERSION.to_owned(),
            internal_ip: Some(node.address.clone()),
        })
        .collect()
}

fn cluster_resources(cluster: &SimCluster) -> ClusterResources {
    let nodes = u64::try_from(cluster.nodes.len()).unwrap_or(u64::MAX);
    let pods = cluster
        .namespaces
        .values()
        .map(|pods| u64::try_from(pods.len()).unwrap_or(u64::MAX))
        .sum::<u64>();
    ClusterResources {
        nodes: u32::try_from(cluster.nodes.len()).unwrap_or(u32::MAX),
        cpu: ResourceUsage {
            capacity: CPU_PER_NODE.saturating_mul(nodes),
            used: pods.saturating_mul(250),
        },
        memory: ResourceUsage {
            capacity: MEMORY_PER_NODE.saturating_mul(nodes),
            used: pods.saturating_mul(256 * 1024 * 1024),
        },
        pods: ResourceUsage {
            capacity: PODS_PER_NODE.saturating_mul(nodes),
            used: pods,
        },
    }
}

fn set_power(state: &mut BackendState, target: &NodeTarget, on: bool) {
    if let Some(node) = state.node_mut(&target.server_id) {
        node.powered = on;
        node.ready = on;
    }
}

fn namespace_status(state: &mut BackendState, namespace: &NamespaceRef) -> Envelope {
    let found = state
        .cluster_of_mut(&namespace.server_id)
        .and_then(|cluster| cluster.namespaces.get(&namespace.namespace))
        .cloned();
    match found {
        Some(pods) => to_envelope(&NamespaceStatus {
            name: namespace.namespace.clone(),
            phase: String::from("Active"),
            pods,
        }),
        None => Envelope::rejected(format!(
            "namespaces \"{}\" not found",
            namespace.namespace
        )),
    }
}

fn find_pod<'a>(state: &'a mut BackendState, pod: &PodRef) -> Option<&'a mut PodStatus> {
    state
        .cluster_of_mut(&pod.server_id)?
        .namespaces
        .get_mut(&pod.namespace)?
        .iter_mut()
        .find(|existing| existing.name == pod.pod_name)
}

fn pod_logs(state: &mut BackendState, request: &GetPodLogs) -> PodLogs {
    let pod = PodRef {
        server_id: request.server_id.clone(),
        hops: request.hops.clone(),
        namespace: request.namespace.clone(),
        pod_name: request.pod_name.clone(),
    };
    let Some(found) = find_pod(state, &pod) else {
        return PodLogs {
            pod_exists: false,
            logs: String::new(),
        };
    };
    let lines: Vec<String> = (1..=5)
        .map(|line| format!("{} line {line}", found.name))
        .collect();
    let keep = request
        .tail_lines
        .and_then(|tail| usize::try_from(tail).ok())
        .unwrap_or(lines.len());
    let start = lines.len().saturating_sub(keep);
    PodLogs {
        pod_exists: true,
        logs: lines.iter().skip(start).cloned().collect::<Vec<_>>().join("\n"),
    }
}

fn running_pod(name: &str, namespace: &str, node: Option<String>) -> PodStatus {
    PodStatus {
        name: name.to_owned(),
        namespace: namespace.to_owned(),
        phase: String::from("Running"),
        ready: true,
        restarts: 0,
        node,
    }
}

fn app_name(repository_url: &str) -> String {
    let last = repository_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(repository_url);
    last.strip_suffix(".git").unwrap_or(last).to_owned()
}

fn create_server(state: &mut BackendState, draft: &ServerDraft) -> Envelope {
    if !state.infras.contains_key(&draft.infra_id) {
        return Envelope::rejected(format!("infra {} not found", draft.infra_id));
    }
    let id = match &draft.id {
        Some(id) if state.servers.contains_key(id) => {
            return Envelope::rejected(format!("server {id} already exists"));
        }
        Some(id) => id.clone(),
        None => state.mint("server"),
    };
    let now = Utc::now();
    let server = Server {
        id: id.clone(),
        name: draft.name.clone(),
        infra_id: draft.infra_id.clone(),
        role: draft.role,
        address: draft.address.clone(),
        port: draft.port,
        status: draft.status,
        hop_chain: draft.hop_chain.clone(),
        join_command: draft.join_command.clone(),
        certificate_key: draft.certificate_key.clone(),
        created_at: Some(now),
        updated_at: Some(now),
    };
    state.servers.insert(id, server.clone());
    to_envelope(&server)
}

fn upsert_permission(
    state: &mut BackendState,
    infra_id: &str,
    user_id: &str,
    email: &str,
    role: PermissionRole,
) -> Permission {
    let permission = Permission {
        user_id: user_id.to_owned(),
        user_email: email.to_owned(),
        role,
    };
    let grants = state.permissions.entry(infra_id.to_owned()).or_default();
    grants.retain(|grant| grant.user_id != user_id);
    grants.push(permission.clone());
    permission
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes variables while holding the global mutex, restoring them on drop.
    pub async fn unset_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hops::HopDescriptor;
    use crate::operation::{InstallFirstMaster, JoinWorker};

    fn chain(host: &str) -> HopChain {
        HopChain::direct(HopDescriptor::new(host, "root", "pw"))
    }

    fn first_master(infra: &str) -> Request {
        Request::from(InstallFirstMaster {
            server_id: String::from("m1"),
            infra_id: infra.to_owned(),
            hops: chain("master-1"),
            lb_hops: None,
            password: None,
            lb_password: None,
        })
    }

    #[tokio::test]
    async fn second_first_master_install_is_refused() {
        let backend = InMemoryBackend::new();
        let infra = backend.seed_infra("prod", InfraKind::Kubernetes);
        let first = backend.send(&first_master(&infra)).await.expect("send");
        assert!(first.success);

        let again = backend.send(&first_master(&infra)).await.expect("send");
        let data = again.into_data().expect("envelope succeeds");
        let result: CommandResult = serde_json::from_value(data).expect("decode");
        assert!(!result.success);
    }

    #[tokio::test]
    async fn worker_join_needs_a_ready_main_master() {
        let backend = InMemoryBackend::new();
        let infra = backend.seed_infra("prod", InfraKind::Kubernetes);
        backend.send(&first_master(&infra)).await.expect("send");
        backend.mark_unhealthy("m1");

        let join = Request::from(JoinWorker {
            server_id: String::from("w1"),
            hops: chain("worker-1"),
            password: "pw".into(),
            main_id: String::from("m1"),
        });
        let data = backend
            .send(&join)
            .await
            .and_then(Envelope::into_data)
            .expect("envelope succeeds");
        let result: CommandResult = serde_json::from_value(data).expect("decode");
        assert!(!result.success);
        assert_eq!(backend.node_names(&infra), vec![String::from("master-1")]);
    }

    #[tokio::test]
    async fn calculate_nodes_is_rejected_outside_a_cluster() {
        let backend = InMemoryBackend::new();
        let request = Request::from(CalculateNodes(NodeTarget::new("ghost", chain("ghost"))));
        let envelope = backend.send(&request).await.expect("send");
        assert!(!envelope.success);
        assert_eq!(backend.calls_to("calculateNodes").len(), 1);
    }

    #[tokio::test]
    async fn unreachable_fault_never_touches_state() {
        let backend = InMemoryBackend::new();
        let infra = backend.seed_infra("prod", InfraKind::Kubernetes);
        backend.fail_transport("installFirstMaster");
        let err = backend
            .send(&first_master(&infra))
            .await
            .expect_err("fault injected");
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert!(backend.node_names(&infra).is_empty());
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn app_name_strips_git_suffix() {
        assert_eq!(app_name("https://git.example/team/shop.git"), "shop");
        assert_eq!(app_name("https://git.example/team/shop/"), "shop");
    }
}
