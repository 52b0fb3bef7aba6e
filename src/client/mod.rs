//! Typed client over a [`Transport`].
//!
//! [`ClusterClient`] validates each request, dispatches it, and maps the
//! envelope onto the operation's typed response. It applies the failure
//! policy of the operation's [`Category`] and never retries: a retry of a
//! partially applied remote script is not safe to automate.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ClusterError, TransportError};
use crate::operation::{Category, Operation, Request, Validate};
use crate::result::CommandResult;
use crate::transport::Transport;

mod cluster;
mod inventory;
mod node;
mod workload;

/// Client for the remote execution backend.
#[derive(Clone, Debug)]
pub struct ClusterClient<T> {
    transport: T,
    operation_timeout: Option<Duration>,
}

impl<T: Transport> ClusterClient<T> {
    /// Wraps `transport` with no caller-side timeout.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            operation_timeout: None,
        }
    }

    /// Bounds how long any single operation may take. When it elapses the
    /// call fails with [`ClusterError::Timeout`] and the outcome is unknown.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs a typed operation and decodes its response.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Validation`] before dispatch when the payload
    /// is incomplete, [`ClusterError::Transport`] when the backend cannot be
    /// reached or answers with a failed envelope, [`ClusterError::Timeout`]
    /// when the operation timeout elapses, and [`ClusterError::Domain`] or
    /// [`ClusterError::PartialSuccess`] when a command reports failure.
    pub async fn call<O: Operation>(&self, operation: O) -> Result<O::Response, ClusterError> {
        let request: Request = operation.into();
        let data = self.dispatch(&request).await?;
        decode(O::NAME, data)
    }

    /// Runs an enumeration, degrading to an empty collection on failure.
    ///
    /// Only validation errors propagate; the request never left the client
    /// in that case, so an empty list would hide a caller bug.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Validation`] when the payload is incomplete.
    pub async fn list<O>(&self, operation: O) -> Result<O::Response, ClusterError>
    where
        O: Operation,
        O::Response: Default,
    {
        debug_assert_eq!(O::CATEGORY, Category::Listing);
        match self.call(operation).await {
            Ok(items) => Ok(items),
            Err(err @ ClusterError::Validation(_)) => Err(err),
            Err(err) => {
                warn!(operation = O::NAME, error = %err, "listing degraded to empty");
                Ok(O::Response::default())
            }
        }
    }

    /// Runs an already-built request and returns the raw `data` payload.
    ///
    /// Command results are still checked, so a failed remote command is a
    /// domain error here too.
    ///
    /// # Errors
    ///
    /// Same as [`ClusterClient::call`].
    pub async fn send_raw(&self, request: &Request) -> Result<Value, ClusterError> {
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: &Request) -> Result<Value, ClusterError> {
        request.validate()?;
        let operation = request.name();
        debug!(operation, "dispatching request");

        let sent = self.transport.send(request);
        let outcome = match self.operation_timeout {
            Some(after) => tokio::time::timeout(after, sent).await.map_err(|_| {
                warn!(operation, timeout_secs = after.as_secs(), "operation timed out");
                ClusterError::Timeout {
                    operation,
                    after,
                    server_id: None,
                }
            })?,
            None => sent.await,
        };
        let data = outcome
            .and_then(crate::transport::Envelope::into_data)
            .map_err(|source| {
                warn!(operation, error = %source, "transport failure");
                ClusterError::Transport { operation, source }
            })?;

        match request.category() {
            Category::Command => {
                let result =
                    CommandResult::deserialize(&data).map_err(|err| malformed(operation, &err))?;
                if !result.success {
                    return Err(failed(operation, result));
                }
                info!(operation, summary = %result.summary(), "remote command succeeded");
            }
            Category::Lookup | Category::Mutation if reports_failure(&data) => {
                let result =
                    CommandResult::deserialize(&data).map_err(|err| malformed(operation, &err))?;
                return Err(failed(operation, result));
            }
            Category::Lookup | Category::Mutation | Category::Listing => {}
        }
        Ok(data)
    }
}

/// Whether a non-command payload is a failed [`CommandResult`] in place of
/// the typed record.
fn reports_failure(data: &Value) -> bool {
    data.get("success").and_then(Value::as_bool) == Some(false)
}

fn failed(operation: &'static str, result: CommandResult) -> ClusterError {
    let err = ClusterError::from_failed_result(operation, result);
    warn!(operation, error = %err, "remote command failed");
    err
}

fn decode<R: DeserializeOwned>(operation: &'static str, data: Value) -> Result<R, ClusterError> {
    serde_json::from_value(data).map_err(|err| malformed(operation, &err))
}

fn malformed(operation: &'static str, err: &serde_json::Error) -> ClusterError {
    ClusterError::Transport {
        operation,
        source: TransportError::Malformed(err.to_string()),
    }
}
