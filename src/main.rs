//! Binary entry point for the hopkube CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use hopkube::test_support::InMemoryBackend;
use hopkube::{
    ClientConfig, ClusterClient, ClusterError, InfraKind, NodeStatus, NodeTarget, Request,
    ServerRole, Transport,
};

mod cli;

use cli::{Cli, SendCommand, ServersCommand, StatusCommand};

/// When set, the CLI talks to an in-process backend seeded with one infra.
const FAKE_BACKEND_ENV: &str = "HOPKUBE_FAKE_BACKEND";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid request document {path}: {message}")]
    Document { path: String, message: String },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error("cannot render output: {0}")]
    Output(String),
}

#[derive(Debug, Serialize)]
struct StatusReport {
    server: String,
    name: String,
    role: ServerRole,
    node: NodeStatus,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli).await.and_then(|output| render(&output)) {
        Ok(rendered) => {
            writeln!(io::stdout(), "{rendered}").ok();
            0
        }
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

async fn run(cli: Cli) -> Result<Value, CliError> {
    if env::var_os(FAKE_BACKEND_ENV).is_some() {
        let client = ClusterClient::new(demo_backend());
        return dispatch(cli, &client).await;
    }

    let config =
        ClientConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let client = config
        .connect()
        .map_err(|err| CliError::Config(err.to_string()))?;
    dispatch(cli, &client).await
}

fn demo_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.seed_infra("demo", InfraKind::Kubernetes);
    backend
}

async fn dispatch<T: Transport>(cli: Cli, client: &ClusterClient<T>) -> Result<Value, CliError> {
    match cli {
        Cli::Infras => to_json(&client.get_infras().await?),
        Cli::Servers(ServersCommand { infra }) => to_json(&client.get_servers(infra).await?),
        Cli::Status(command) => status(client, command).await,
        Cli::Send(command) => {
            let request = read_request(&command)?;
            Ok(client.send_raw(&request).await?)
        }
    }
}

async fn status<T: Transport>(
    client: &ClusterClient<T>,
    command: StatusCommand,
) -> Result<Value, CliError> {
    let server = client.get_server(command.server).await?;
    let infra = command.infra.unwrap_or_else(|| server.infra_id.clone());
    let node = client
        .get_node_status(NodeTarget::new(server.id.clone(), server.hop_chain.clone()).in_infra(infra))
        .await?;
    to_json(&StatusReport {
        server: server.id,
        name: server.name,
        role: server.role,
        node,
    })
}

fn read_request(command: &SendCommand) -> Result<Request, CliError> {
    let path = Utf8Path::new(&command.file);
    let contents = read_file(path)?;
    serde_json::from_str(&contents).map_err(|err| CliError::Document {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn read_file(path: &Utf8Path) -> Result<String, CliError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| CliError::Read {
        path: path.to_string(),
        message: String::from("path is missing a filename"),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| CliError::Read {
        path: parent.to_string(),
        message: err.to_string(),
    })?;

    dir.read_to_string(file_name).map_err(|err| CliError::Read {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|err| CliError::Output(err.to_string()))
}

fn render(value: &Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use hopkube::ServerDraft;
    use hopkube::hops::{HopChain, HopDescriptor};

    use super::*;

    #[tokio::test]
    async fn infras_lists_the_seeded_infra() {
        let client = ClusterClient::new(demo_backend());
        let output = dispatch(Cli::Infras, &client).await.expect("dispatch");
        let names: Vec<_> = output
            .as_array()
            .expect("array output")
            .iter()
            .filter_map(|infra| infra.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["demo"]);
    }

    #[tokio::test]
    async fn status_reports_the_live_node() {
        let backend = demo_backend();
        let client = ClusterClient::new(backend);
        let infra = client
            .get_infras()
            .await
            .expect("list")
            .first()
            .map(|found| found.id.clone())
            .expect("seeded infra");
        let chain = HopChain::direct(HopDescriptor::new("10.0.0.11", "root", "pw"));
        let server = client
            .create_server(ServerDraft::new("master-1", &infra, ServerRole::Master, chain))
            .await
            .expect("register");

        let output = status(
            &client,
            StatusCommand {
                server: server.id.clone(),
                infra: None,
            },
        )
        .await
        .expect("status");

        assert_eq!(output["server"], Value::from(server.id));
        assert_eq!(output["node"]["status"], Value::from("unknown"));
    }

    #[tokio::test]
    async fn status_for_unknown_server_is_a_cluster_error() {
        let client = ClusterClient::new(demo_backend());
        let err = status(
            &client,
            StatusCommand {
                server: String::from("ghost"),
                infra: None,
            },
        )
        .await
        .expect_err("unknown server");
        assert!(
            matches!(err, CliError::Cluster(ClusterError::ServerNotFound { .. })),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn send_rejects_unknown_operations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("request.json");
        fs::write(&path, r#"{"operation":"formatDisk","payload":{}}"#).expect("write");

        let err = read_request(&SendCommand {
            file: path.to_string_lossy().into_owned(),
        })
        .expect_err("unknown operation");
        assert!(matches!(err, CliError::Document { .. }), "unexpected error: {err}");
    }

    #[test]
    fn send_reports_missing_files() {
        let err = read_request(&SendCommand {
            file: String::from("does-not-exist.json"),
        })
        .expect_err("missing file");
        assert!(matches!(err, CliError::Read { .. }), "unexpected error: {err}");
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        write_error(&mut buf, &CliError::Config(String::from("missing endpoint")));
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("configuration error: missing endpoint"),
            "rendered: {rendered}"
        );
    }
}
