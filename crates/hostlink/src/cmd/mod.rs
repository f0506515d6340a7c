use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod host;
pub mod notify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host a control channel: bind, accept a runtime, serve the demo API
    /// groups until Ctrl-C or disconnect.
    Host(HostArgs),
    /// Connect and issue a single call, printing the result.
    Call(CallArgs),
    /// Connect and send a fire-and-forget call.
    Notify(NotifyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Host(args) => host::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Notify(args) => notify::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct HostArgs {
    /// Socket path to bind.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Fully-qualified method name, e.g. Storage_get.
    pub method: String,
    /// Arguments; each is parsed as JSON, falling back to a plain string.
    pub args: Vec<String>,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Fully-qualified method name.
    pub method: String,
    /// Arguments; each is parsed as JSON, falling back to a plain string.
    pub args: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
