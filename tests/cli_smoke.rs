//! Behavioural smoke tests for the `hopkube` CLI.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

const FAKE_BACKEND: &str = "HOPKUBE_FAKE_BACKEND";

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn infras_lists_the_seeded_infra() {
    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.env(FAKE_BACKEND, "1");
    cmd.arg("infras");

    cmd.assert().success().stdout(contains("\"demo\""));
}

#[test]
fn servers_of_an_empty_infra_is_an_empty_array() {
    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.env(FAKE_BACKEND, "1");
    cmd.args(["servers", "--infra", "infra-1"]);

    cmd.assert().success().stdout("[]\n");
}

#[test]
fn status_of_an_unknown_server_exits_non_zero() {
    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.env(FAKE_BACKEND, "1");
    cmd.args(["status", "--server", "ghost"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("server ghost not found"));
}

#[test]
fn send_prints_the_response_data() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("lookup.json");
    std::fs::write(
        &path,
        r#"{"operation": "getInfraById", "payload": {"id": "infra-1"}}"#,
    )
    .unwrap_or_else(|err| panic!("write request: {err}"));

    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.env(FAKE_BACKEND, "1");
    cmd.arg("send").arg(&path);

    cmd.assert()
        .success()
        .stdout(contains("\"name\": \"demo\""));
}

#[test]
fn missing_endpoint_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let mut cmd = cargo_bin_cmd!("hopkube");
    cmd.current_dir(tmp.path())
        .env_remove(FAKE_BACKEND)
        .env_remove("HOPKUBE_ENDPOINT")
        .env_remove("HOPKUBE_CONFIG_PATH")
        .env("HOME", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("infras");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("configuration error"));
}
