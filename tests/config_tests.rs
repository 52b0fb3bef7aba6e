//! Integration tests for configuration loading and validation.

use std::time::Duration;

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use hopkube::test_support::EnvGuard;
use hopkube::{ClientConfig, ConfigError};
use rstest::*;
use tempfile::TempDir;

#[fixture]
fn valid_config() -> ClientConfig {
    ClientConfig {
        endpoint: String::from("https://backend.example/api/operations"),
        api_token: Some(String::from("token-example")),
        request_timeout_secs: 30,
        operation_timeout_secs: 600,
    }
}

/// Each rejected field names both the environment variable and the TOML key
/// that would fix it.
#[rstest]
#[case::endpoint(
    |cfg: &mut ClientConfig| cfg.endpoint.clear(),
    "HOPKUBE_ENDPOINT",
    "endpoint"
)]
#[case::token(
    |cfg: &mut ClientConfig| cfg.api_token = Some(String::from(" ")),
    "HOPKUBE_API_TOKEN",
    "api_token"
)]
#[case::request_timeout(
    |cfg: &mut ClientConfig| cfg.request_timeout_secs = 0,
    "HOPKUBE_REQUEST_TIMEOUT_SECS",
    "request_timeout_secs"
)]
fn validation_errors_are_actionable(
    valid_config: ClientConfig,
    #[case] mutate: fn(&mut ClientConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let message = cfg
        .validate()
        .expect_err("validation should fail")
        .to_string();
    assert!(message.contains(env_var), "should mention {env_var}: {message}");
    assert!(message.contains(toml_key), "should mention {toml_key}: {message}");
    assert!(message.contains("hopkube.toml"), "should mention config file: {message}");
}

#[rstest]
fn empty_endpoint_is_a_missing_field(valid_config: ClientConfig) {
    let cfg = ClientConfig {
        endpoint: String::new(),
        ..valid_config
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::MissingField(_))));
}

#[tokio::test]
async fn environment_overrides_defaults() {
    let _guard = EnvGuard::set_vars(&[
        ("HOPKUBE_ENDPOINT", "http://127.0.0.1:9000/operations"),
        ("HOPKUBE_OPERATION_TIMEOUT_SECS", "0"),
    ])
    .await;

    let cfg = ClientConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("load from env: {err}"));

    assert_eq!(cfg.endpoint, "http://127.0.0.1:9000/operations");
    assert_eq!(cfg.operation_timeout(), None);
    assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    cfg.connect()
        .unwrap_or_else(|err| panic!("connect from env: {err}"));
}

#[tokio::test]
async fn explicit_config_file_is_loaded() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write(
            "hopkube.toml",
            "endpoint = \"https://ops.example/api\"\nrequest_timeout_secs = 5\n",
        )
        .unwrap_or_else(|err| panic!("write config: {err}"));
    let path = root.join("hopkube.toml");

    let _guard = EnvGuard::set_vars(&[("HOPKUBE_CONFIG_PATH", path.as_str())]).await;
    let cfg = ClientConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("load from file: {err}"));

    assert_eq!(cfg.endpoint, "https://ops.example/api");
    assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.operation_timeout(), Some(Duration::from_secs(1800)));
}
