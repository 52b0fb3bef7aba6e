//! Error taxonomy for cluster operations.
//!
//! Failures fall into a handful of classes (see [`ErrorClass`]) that decide
//! what a caller may safely do next: fix the request, retry the transport,
//! inspect the remote step tree, or verify the cluster before retrying.

use std::time::Duration;

use thiserror::Error;

use crate::result::CommandResult;
use crate::topology::TopologyError;

/// Raised when a request is rejected before dispatch.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Payload field that failed validation.
    pub field: String,
    /// Why the field was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Builds a validation error for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Rejects blank strings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `value` is empty after trimming.
    pub fn require(value: &str, field: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            return Err(Self::new(field, "must not be empty"));
        }
        Ok(())
    }
}

/// Failures of the request/response channel itself.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the backend cannot be reached.
    #[error("request failed: backend unreachable: {0}")]
    Unreachable(String),
    /// Raised when the backend answers with a non-success HTTP status.
    #[error("request failed: backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// Raised when the response body is not a valid envelope.
    #[error("request failed: malformed response: {0}")]
    Malformed(String),
    /// Raised when the envelope itself reports failure.
    #[error("request failed: {0}")]
    Rejected(String),
}

/// Coarse classification of a [`ClusterError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The request never left the client.
    Validation,
    /// The request did not produce a usable response.
    Transport,
    /// The remote side answered and reported failure.
    Domain,
    /// The outcome is unknown and must be verified before retrying.
    Timeout,
    /// The operation is not legal from the tracked cluster topology.
    Topology,
    /// The caller lacks the required role.
    Permission,
}

/// Errors returned by the cluster client and orchestrator.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Raised when a request fails validation before dispatch.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Raised when the transport fails or the envelope reports failure.
    #[error("{operation}: {source}")]
    Transport {
        /// Operation name.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// Raised when the caller-side timeout elapses.
    #[error(
        "{operation} did not complete within {}s; outcome unknown, verify node state before retrying",
        .after.as_secs()
    )]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Timeout that elapsed.
        after: Duration,
        /// Server whose unknown outcome was recorded, to pass to
        /// `ClusterOrchestrator::verify_pending`.
        server_id: Option<String>,
    },
    /// Raised when the remote executor reports failure.
    #[error("{operation} failed: {}", .result.summary())]
    Domain {
        /// Operation name.
        operation: &'static str,
        /// Full result tree as reported by the executor.
        result: Box<CommandResult>,
    },
    /// Raised when some remote steps succeeded before the operation failed.
    #[error(
        "{operation} partially applied ({} steps succeeded): {}",
        .result.succeeded_steps().len(),
        .result.summary()
    )]
    PartialSuccess {
        /// Operation name.
        operation: &'static str,
        /// Full result tree as reported by the executor.
        result: Box<CommandResult>,
    },
    /// Raised when the topology state machine rejects the operation.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// Raised when the infra type does not support the operation.
    #[error("infra {infra_id} of type {kind} does not support {operation}")]
    UnsupportedInfra {
        /// Infra identifier.
        infra_id: String,
        /// Infra type label.
        kind: String,
        /// Operation name.
        operation: &'static str,
    },
    /// Raised when a referenced infra is not in the registry.
    #[error("infra {infra_id} not found in the registry")]
    InfraNotFound {
        /// Infra identifier.
        infra_id: String,
    },
    /// Raised when a referenced server is not in the registry.
    #[error("server {server_id} not found in the registry")]
    ServerNotFound {
        /// Server identifier.
        server_id: String,
    },
    /// Raised when the main master referenced by a join or rebuild is
    /// missing or unknown.
    #[error("main master '{main_id}' is not a registered master")]
    MainMasterNotFound {
        /// Referenced identifier, possibly empty.
        main_id: String,
    },
    /// Raised when the acting user lacks the required role.
    #[error("user {user_id} lacks {required} permission on infra {infra_id}")]
    PermissionDenied {
        /// Acting user.
        user_id: String,
        /// Infra identifier.
        infra_id: String,
        /// Role required for the operation.
        required: String,
    },
    /// Raised when a registry delete would orphan a live cluster member.
    #[error("server {server_id} is still a cluster member; remove it from the cluster first")]
    StillClusterMember {
        /// Server identifier.
        server_id: String,
    },
    /// Raised when an earlier operation on the server has an unknown outcome.
    #[error("{operation} on server {server_id} has an unknown outcome; verify it before retrying")]
    OutcomeUnknown {
        /// Server identifier.
        server_id: String,
        /// Operation whose outcome is unverified.
        operation: &'static str,
    },
}

impl ClusterError {
    /// Returns the failure class.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Transport { .. } => ErrorClass::Transport,
            Self::Timeout { .. } | Self::OutcomeUnknown { .. } => ErrorClass::Timeout,
            Self::Domain { .. }
            | Self::PartialSuccess { .. }
            | Self::UnsupportedInfra { .. }
            | Self::InfraNotFound { .. }
            | Self::ServerNotFound { .. }
            | Self::MainMasterNotFound { .. }
            | Self::StillClusterMember { .. } => ErrorClass::Domain,
            Self::Topology(_) => ErrorClass::Topology,
            Self::PermissionDenied { .. } => ErrorClass::Permission,
        }
    }

    /// Returns `true` for domain-class failures.
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        matches!(self.class(), ErrorClass::Domain)
    }

    /// The remote result tree, when the executor answered.
    #[must_use]
    pub fn command_result(&self) -> Option<&CommandResult> {
        match self {
            Self::Domain { result, .. } | Self::PartialSuccess { result, .. } => Some(result.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn from_failed_result(operation: &'static str, result: CommandResult) -> Self {
        let normalised = Box::new(result.normalised());
        if normalised.is_partial() {
            Self::PartialSuccess {
                operation,
                result: normalised,
            }
        } else {
            Self::Domain {
                operation,
                result: normalised,
            }
        }
    }
}
