//! Command-line interface definitions for the `hopkube` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `hopkube` binary.
#[derive(Debug, Parser)]
#[command(
    name = "hopkube",
    about = "Inspect and drive Kubernetes clusters through the remote execution backend",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List every infra in the registry.
    #[command(name = "infras", about = "List every infra in the registry")]
    Infras,
    /// List the servers registered for an infra.
    #[command(name = "servers", about = "List the servers registered for an infra")]
    Servers(ServersCommand),
    /// Read the live status of one node.
    #[command(name = "status", about = "Read the live status of one node")]
    Status(StatusCommand),
    /// Send a raw request document and print the response data.
    #[command(name = "send", about = "Send a raw request document and print the response data")]
    Send(SendCommand),
}

/// Arguments for the `hopkube servers` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ServersCommand {
    /// Infra whose servers are listed.
    #[arg(long, value_name = "ID")]
    pub(crate) infra: String,
}

/// Arguments for the `hopkube status` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct StatusCommand {
    /// Registry id of the server to check.
    #[arg(long, value_name = "ID")]
    pub(crate) server: String,
    /// Scope the check to this infra instead of the server's own.
    #[arg(long, value_name = "ID")]
    pub(crate) infra: Option<String>,
}

/// Arguments for the `hopkube send` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SendCommand {
    /// Path to a JSON document of the form `{"operation": ..., "payload": ...}`.
    #[arg(value_name = "FILE")]
    pub(crate) file: String,
}
