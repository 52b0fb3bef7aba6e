//! Client configuration loaded via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::client::ClusterClient;
use crate::transport::HttpTransport;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bound on a whole operation in seconds. Bootstrap scripts can run
/// for many minutes.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 1800;

/// Backend connection settings, merged from defaults, configuration files,
/// environment variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HOPKUBE",
    discovery(
        app_name = "hopkube",
        env_var = "HOPKUBE_CONFIG_PATH",
        config_file_name = "hopkube.toml",
        dotfile_name = ".hopkube.toml",
        project_file_name = "hopkube.toml"
    )
)]
pub struct ClientConfig {
    /// URL of the backend's operation endpoint.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Timeout for a single HTTP exchange, in seconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
    /// Upper bound for a whole operation, in seconds. Zero disables it.
    #[ortho_config(default = DEFAULT_OPERATION_TIMEOUT_SECS)]
    pub operation_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to hopkube.toml",
            self.env_var, self.toml_key
        )
    }
}

const ENDPOINT: FieldMetadata =
    FieldMetadata::new("backend endpoint", "HOPKUBE_ENDPOINT", "endpoint");
const API_TOKEN: FieldMetadata =
    FieldMetadata::new("API token", "HOPKUBE_API_TOKEN", "api_token");
const REQUEST_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "request timeout",
    "HOPKUBE_REQUEST_TIMEOUT_SECS",
    "request_timeout_secs",
);

impl ClientConfig {
    /// Loads configuration using the `ortho-config` derive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("hopkube")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages say how to provide the
    /// value through the environment or `hopkube.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the endpoint is empty and
    /// [`ConfigError::Invalid`] when a value is present but unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                ENDPOINT.description,
                ENDPOINT.hint()
            )));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "{} must be an http(s) URL, got '{endpoint}': {}",
                ENDPOINT.description,
                ENDPOINT.hint()
            )));
        }
        if self
            .api_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "{} is set but empty: {}",
                API_TOKEN.description,
                API_TOKEN.hint()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be at least one second: {}",
                REQUEST_TIMEOUT.description,
                REQUEST_TIMEOUT.hint()
            )));
        }
        Ok(())
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whole-operation timeout, `None` when disabled.
    #[must_use]
    pub const fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validates the configuration and builds an HTTP-backed client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the HTTP client
    /// cannot be built.
    pub fn connect(&self) -> Result<ClusterClient<HttpTransport>, ConfigError> {
        self.validate()?;
        let mut transport = HttpTransport::new(self.endpoint.trim(), self.request_timeout())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(token) = &self.api_token {
            transport = transport.with_token(SecretString::from(token.clone()));
        }
        let client = ClusterClient::new(transport);
        Ok(match self.operation_timeout() {
            Some(timeout) => client.with_operation_timeout(timeout),
            None => client,
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn config() -> ClientConfig {
        ClientConfig {
            endpoint: String::from("https://backend.example/api/operations"),
            api_token: Some(String::from("token")),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }

    #[rstest]
    fn missing_endpoint_names_env_var_and_key(mut config: ClientConfig) {
        config.endpoint = String::from("  ");
        let err = config.validate().expect_err("endpoint is required");
        let message = err.to_string();
        assert!(message.contains("HOPKUBE_ENDPOINT"), "{message}");
        assert!(message.contains("endpoint to hopkube.toml"), "{message}");
    }

    #[rstest]
    #[case::scheme("backend.example:8080")]
    #[case::ftp("ftp://backend.example")]
    fn non_http_endpoints_are_rejected(mut config: ClientConfig, #[case] endpoint: &str) {
        config.endpoint = endpoint.to_owned();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[rstest]
    fn blank_token_is_rejected(mut config: ClientConfig) {
        config.api_token = Some(String::new());
        let err = config.validate().expect_err("blank token");
        assert!(err.to_string().contains("HOPKUBE_API_TOKEN"));
    }

    #[rstest]
    fn zero_operation_timeout_disables_it(mut config: ClientConfig) {
        config.operation_timeout_secs = 0;
        assert_eq!(config.operation_timeout(), None);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.connect().is_ok());
    }
}
