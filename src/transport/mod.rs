//! Boundary to the remote execution backend.
//!
//! Every operation travels as one [`Request`] and comes back as one
//! [`Envelope`]. The backend owns SSH connections, command execution, and
//! the registry store; this crate only speaks the envelope protocol.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::operation::Request;

mod http;

pub use http::HttpTransport;

/// Transport-level response wrapper.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    /// Whether the backend handled the request.
    pub success: bool,
    /// Operation payload, decoded per operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// A successful envelope carrying `data`.
    #[must_use]
    pub const fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed envelope carrying `error`.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Returns the payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] when the envelope reports
    /// failure. A missing message is replaced by a generic one so the error
    /// is never blank.
    pub fn into_data(self) -> Result<serde_json::Value, TransportError> {
        if self.success {
            return Ok(self.data.unwrap_or(serde_json::Value::Null));
        }
        let reason = self
            .error
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| String::from("backend reported failure without a message"));
        Err(TransportError::Rejected(reason))
    }
}

/// Future returned by transport calls.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Envelope, TransportError>> + Send + 'a>>;

/// Sends requests to the execution backend.
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the backend's envelope.
    fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_becomes_rejected_error() {
        let err = Envelope::rejected("registry unavailable")
            .into_data()
            .expect_err("failed envelope must error");
        assert_eq!(
            err,
            TransportError::Rejected(String::from("registry unavailable"))
        );
    }

    #[test]
    fn failed_envelope_without_message_is_still_explained() {
        let err = Envelope::default()
            .into_data()
            .expect_err("failed envelope must error");
        assert!(err.to_string().contains("without a message"));
    }

    #[test]
    fn missing_data_decodes_as_null() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"success":true}"#).expect("decode envelope");
        assert_eq!(envelope.into_data(), Ok(serde_json::Value::Null));
    }
}
