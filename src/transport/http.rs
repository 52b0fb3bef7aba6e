//! HTTP transport that posts every request to a single backend endpoint.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{Envelope, Transport, TransportFuture};
use crate::error::TransportError;
use crate::operation::Request;

const ERROR_BODY_LIMIT: usize = 512;

/// Posts requests as JSON to the backend's operation endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<SecretString>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unreachable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token: None,
            request_timeout,
        })
    }

    /// Sends `token` as a bearer token on every request.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    /// Endpoint the transport posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &Request) -> Result<Envelope, TransportError> {
        debug!(operation = request.name(), endpoint = %self.endpoint, "posting request");
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        response
            .json::<Envelope>()
            .await
            .map_err(|err| TransportError::Malformed(err.to_string()))
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
        Box::pin(self.post(request))
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundaries() {
        let body = "é".repeat(ERROR_BODY_LIMIT);
        let cut = truncate(body);
        assert!(cut.len() <= ERROR_BODY_LIMIT + '…'.len_utf8());
        assert!(cut.ends_with('…'));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let transport = HttpTransport::new("http://127.0.0.1:9/ops", Duration::from_millis(200))
            .expect("build transport");
        let request = Request::from(crate::operation::GetInfras {});
        let err = transport
            .send(&request)
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, TransportError::Unreachable(_)));
    }

    #[test]
    fn debug_output_omits_the_token() {
        let transport = HttpTransport::new("http://backend.invalid/ops", Duration::from_secs(1))
            .expect("build transport")
            .with_token(SecretString::from(String::from("s3cret")));
        assert!(!format!("{transport:?}").contains("s3cret"));
    }
}
