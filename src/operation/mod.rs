//! Catalogue of every named operation the execution backend understands.
//!
//! Each operation is a typed request struct implementing [`Operation`], which
//! fixes its wire name, its [`Category`], and its typed response. All of them
//! are collected in the [`Request`] tagged union, which serialises to the
//! single-endpoint wire format `{"operation": <name>, "payload": {...}}`.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::registry::{Infra, Permission, Server, User};
use crate::result::CommandResult;

mod cluster;
mod inventory;
mod node;
mod workload;

pub use cluster::{
    DeleteMaster, DeleteWorker, InstallFirstMaster, InstallLoadBalancer, JoinMaster, JoinWorker,
    RebuildFirstMaster, RebuildHa, RebuildMaster, RebuildWorker, RemoveNode,
};
pub use inventory::{
    CreateInfra, CreateServer, DeleteInfra, DeleteServer, GetAllUsers, GetInfraById,
    GetInfraPermissions, GetInfras, GetServerById, GetServers, RemoveInfraPermission,
    SetInfraPermission, UpdateInfra, UpdateServer,
};
pub use node::{
    CalculateNodes, CalculateResources, ClusterNode, ClusterResources, GetNodeStatus, NodeHealth,
    NodeStatus, NodeTarget, RenewCertificate, ResourceUsage, RestartServer, StartServer,
    StopServer,
};
pub use workload::{
    DeleteNamespace, DeletePod, DeployKubernetes, GetNamespaceStatus, GetPodLogs, GetPodStatus,
    GitCredentials, NamespaceRef, NamespaceStatus, PodLogs, PodRef, PodStatus,
    RegistryCredentials, RestartPod,
};

/// How an operation interacts with state, which decides its failure policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Category {
    /// Enumerates records for a listing view.
    Listing,
    /// Reads a single entity or live cluster state.
    Lookup,
    /// Writes a registry record.
    Mutation,
    /// Runs a remote command and reports a [`CommandResult`].
    Command,
}

/// What the client does when an operation fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Log the failure and return an empty collection.
    DegradeToEmpty,
    /// Return the error to the caller.
    Propagate,
}

impl Category {
    /// Failure policy declared for the category.
    #[must_use]
    pub const fn policy(self) -> FailurePolicy {
        match self {
            Self::Listing => FailurePolicy::DegradeToEmpty,
            Self::Lookup | Self::Mutation | Self::Command => FailurePolicy::Propagate,
        }
    }

    /// Whether the operation only reads.
    #[must_use]
    pub const fn is_query(self) -> bool {
        matches!(self, Self::Listing | Self::Lookup)
    }
}

/// Pre-dispatch validation of a request payload.
pub trait Validate {
    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first invalid field.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// A typed request with a fixed wire name and response type.
pub trait Operation: Validate + Into<Request> + Send + Sync {
    /// Wire name of the operation.
    const NAME: &'static str;
    /// Category of the operation.
    const CATEGORY: Category;
    /// Type decoded from the envelope's `data` field.
    type Response: DeserializeOwned + Send;
}

macro_rules! operation_catalog {
    ($( $(#[$doc:meta])* $variant:ident($ty:ty) => $name:literal, $category:ident, $response:ty; )+) => {
        /// Any operation, tagged by its wire name.
        #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
        #[serde(tag = "operation", content = "payload")]
        pub enum Request {
            $(
                $(#[$doc])*
                #[serde(rename = $name)]
                $variant($ty),
            )+
        }

        impl Request {
            /// Wire name of the operation.
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => $name, )+
                }
            }

            /// Category of the operation.
            #[must_use]
            pub const fn category(&self) -> Category {
                match self {
                    $( Self::$variant(_) => Category::$category, )+
                }
            }
        }

        impl Validate for Request {
            fn validate(&self) -> Result<(), ValidationError> {
                match self {
                    $( Self::$variant(inner) => inner.validate(), )+
                }
            }
        }

        /// Every operation name with its category.
        pub const CATALOG: &[(&str, Category)] = &[
            $( ($name, Category::$category), )+
        ];

        $(
            impl From<$ty> for Request {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl Operation for $ty {
                const NAME: &'static str = $name;
                const CATEGORY: Category = Category::$category;
                type Response = $response;
            }
        )+
    };
}

operation_catalog! {
    /// Installs the control-plane load balancer.
    InstallLoadBalancer(InstallLoadBalancer) => "installLoadBalancer", Command, CommandResult;
    /// Bootstraps the first control-plane node.
    InstallFirstMaster(InstallFirstMaster) => "installFirstMaster", Command, CommandResult;
    /// Joins an additional control-plane node.
    JoinMaster(JoinMaster) => "joinMaster", Command, CommandResult;
    /// Joins a worker node.
    JoinWorker(JoinWorker) => "joinWorker", Command, CommandResult;
    /// Reconciles a failed first master with existing cluster state.
    RebuildFirstMaster(RebuildFirstMaster) => "rebuildFirstMaster", Command, CommandResult;
    /// Reconciles a failed joined master.
    RebuildMaster(RebuildMaster) => "rebuildMaster", Command, CommandResult;
    /// Reconciles a failed worker.
    RebuildWorker(RebuildWorker) => "rebuildWorker", Command, CommandResult;
    /// Repairs load-balancer to control-plane routing.
    RebuildHa(RebuildHa) => "rebuildHA", Command, CommandResult;
    /// Removes a control-plane node.
    DeleteMaster(DeleteMaster) => "deleteMaster", Command, CommandResult;
    /// Removes a worker node.
    DeleteWorker(DeleteWorker) => "deleteWorker", Command, CommandResult;
    /// Removes a node by Kubernetes node name.
    RemoveNode(RemoveNode) => "removeNode", Command, CommandResult;
    /// Reads one node's status.
    GetNodeStatus(GetNodeStatus) => "getNodeStatus", Lookup, NodeStatus;
    /// Enumerates live cluster members.
    CalculateNodes(CalculateNodes) => "calculateNodes", Lookup, Vec<ClusterNode>;
    /// Reads aggregate capacity and utilisation.
    CalculateResources(CalculateResources) => "calculateResources", Lookup, ClusterResources;
    /// Renews control-plane certificates.
    RenewCertificate(RenewCertificate) => "renewCertificate", Command, CommandResult;
    /// Powers a machine on.
    StartServer(StartServer) => "startServer", Command, CommandResult;
    /// Powers a machine off.
    StopServer(StopServer) => "stopServer", Command, CommandResult;
    /// Power-cycles a machine.
    RestartServer(RestartServer) => "restartServer", Command, CommandResult;
    /// Reads a namespace and its pods.
    GetNamespaceStatus(GetNamespaceStatus) => "getNamespaceStatus", Lookup, NamespaceStatus;
    /// Reads one pod.
    GetPodStatus(GetPodStatus) => "getPodStatus", Lookup, PodStatus;
    /// Runs the build-and-deploy job.
    DeployKubernetes(DeployKubernetes) => "deployKubernetes", Command, CommandResult;
    /// Deletes a namespace.
    DeleteNamespace(DeleteNamespace) => "deleteNamespace", Command, CommandResult;
    /// Fetches pod logs.
    GetPodLogs(GetPodLogs) => "getPodLogs", Lookup, PodLogs;
    /// Restarts a pod.
    RestartPod(RestartPod) => "restartPod", Command, CommandResult;
    /// Deletes a pod.
    DeletePod(DeletePod) => "deletePod", Command, CommandResult;
    /// Creates an infra record.
    CreateInfra(CreateInfra) => "createInfra", Mutation, Infra;
    /// Updates an infra record.
    UpdateInfra(UpdateInfra) => "updateInfra", Mutation, Infra;
    /// Deletes an infra record.
    DeleteInfra(DeleteInfra) => "deleteInfra", Mutation, IgnoredAny;
    /// Reads one infra record; `null` when it does not exist.
    GetInfraById(GetInfraById) => "getInfraById", Lookup, Option<Infra>;
    /// Lists infra records.
    GetInfras(GetInfras) => "getInfras", Listing, Vec<Infra>;
    /// Creates a server record.
    CreateServer(CreateServer) => "createServer", Mutation, Server;
    /// Updates a server record.
    UpdateServer(UpdateServer) => "updateServer", Mutation, Server;
    /// Deletes a server record.
    DeleteServer(DeleteServer) => "deleteServer", Mutation, IgnoredAny;
    /// Reads one server record; `null` when it does not exist.
    GetServerById(GetServerById) => "getServerById", Lookup, Option<Server>;
    /// Lists the server records of an infra.
    GetServers(GetServers) => "getServers", Listing, Vec<Server>;
    /// Lists the permissions on an infra.
    GetInfraPermissions(GetInfraPermissions) => "getInfraPermissions", Listing, Vec<Permission>;
    /// Grants or changes a user's role on an infra.
    SetInfraPermission(SetInfraPermission) => "setInfraPermission", Mutation, Permission;
    /// Revokes a user's role on an infra.
    RemoveInfraPermission(RemoveInfraPermission) => "removeInfraPermission", Mutation, IgnoredAny;
    /// Lists users.
    GetAllUsers(GetAllUsers) => "getAllUsers", Listing, Vec<User>;
}

impl Request {
    /// Whether the operation changes cluster membership.
    #[must_use]
    pub const fn changes_topology(&self) -> bool {
        matches!(
            self,
            Self::InstallLoadBalancer(_)
                | Self::InstallFirstMaster(_)
                | Self::JoinMaster(_)
                | Self::JoinWorker(_)
                | Self::RebuildFirstMaster(_)
                | Self::RebuildMaster(_)
                | Self::RebuildWorker(_)
                | Self::RebuildHa(_)
                | Self::DeleteMaster(_)
                | Self::DeleteWorker(_)
                | Self::RemoveNode(_)
        )
    }
}
