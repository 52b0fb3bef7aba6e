//! Core library for the hopkube cluster lifecycle client.
//!
//! The crate drives Kubernetes clusters whose nodes sit behind chains of SSH
//! bastions. It never opens SSH sessions itself: every operation is a named
//! request sent to a remote execution backend through a [`Transport`], and
//! every outcome comes back as a [`CommandResult`] tree or a typed payload.
//! [`ClusterClient`] offers one typed method per operation and
//! [`ClusterOrchestrator`] layers topology guards and registry bookkeeping on
//! top of it.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod hops;
pub mod lifecycle;
pub mod operation;
pub mod orchestrator;
pub mod registry;
pub mod result;
pub mod test_support;
pub mod topology;
pub mod transport;

pub use client::ClusterClient;
pub use config::{ClientConfig, ConfigError};
pub use credential::Credential;
pub use error::{ClusterError, ErrorClass, TransportError, ValidationError};
pub use hops::{HopChain, HopDescriptor};
pub use lifecycle::{Reconciliation, RestartPhases, reconcile, restart_phases};
pub use operation::{
    CATALOG, Category, ClusterNode, ClusterResources, FailurePolicy, NodeHealth, NodeStatus,
    NodeTarget, Operation, Request, Validate,
};
pub use orchestrator::{ClusterOrchestrator, NodeSpec, PendingOperation, Peer, Verification};
pub use registry::{
    Infra, InfraKind, Permission, PermissionRole, Server, ServerDraft, ServerPatch, ServerRole,
    ServerStatus, User,
};
pub use result::CommandResult;
pub use topology::{ClusterTopology, TopologyError, TopologyOp, TopologyState};
pub use transport::{Envelope, HttpTransport, Transport, TransportFuture};
