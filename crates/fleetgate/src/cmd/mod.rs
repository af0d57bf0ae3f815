use std::path::PathBuf;

use clap::{Args, Subcommand};
use fleetgate_protocol::GpsCommand;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod send;
pub mod serve;
pub mod stats;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the device gateway.
    Serve(ServeArgs),
    /// Send a command to a connected device.
    Send(SendArgs),
    /// Show whether a device is connected.
    Status(StatusArgs),
    /// Show connected devices.
    Stats(StatsArgs),
    /// Decode a hex-encoded frame.
    Decode(DecodeArgs),
    /// Encode a command frame as hex.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Stats(args) => stats::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Runtime for subcommands that talk to sockets.
pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime start failed", err))
}

#[derive(Args, Debug, Clone)]
pub struct ControlArgs {
    /// Control socket of a running gateway.
    #[arg(long, value_name = "PATH", env = "FLEETGATE_CONTROL_SOCKET")]
    pub socket: Option<PathBuf>,
}

impl ControlArgs {
    pub fn path(&self) -> PathBuf {
        self.socket
            .clone()
            .unwrap_or_else(fleetgate_gateway::default_control_socket)
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE", env = "FLEETGATE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Device listen address (host:port).
    #[arg(long, value_name = "ADDR", env = "FLEETGATE_LISTEN")]
    pub listen: Option<String>,
    /// Control socket path.
    #[arg(long, value_name = "PATH", env = "FLEETGATE_CONTROL_SOCKET")]
    pub control_socket: Option<PathBuf>,
    /// Seconds without a frame before a device is disconnected.
    #[arg(long, value_name = "SECS", env = "FLEETGATE_READ_IDLE_TIMEOUT")]
    pub read_idle_timeout: Option<u64>,
    /// Token returned in registration acknowledgements.
    #[arg(long, value_name = "TOKEN", env = "FLEETGATE_AUTH_TOKEN")]
    pub auth_token: Option<String>,
    /// Log positions instead of printing them to stdout.
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device serial number.
    pub serial: String,
    /// Named command.
    #[arg(required_unless_present = "raw", conflicts_with = "raw")]
    pub command: Option<GpsCommand>,
    /// Pre-framed message as hex.
    #[arg(long, value_name = "HEX")]
    pub raw: Option<String>,
    #[command(flatten)]
    pub control: ControlArgs,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Device serial number.
    pub serial: String,
    #[command(flatten)]
    pub control: ControlArgs,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub control: ControlArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex, with or without the 7e delimiters.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Device serial number.
    pub serial: String,
    /// Named command.
    pub command: GpsCommand,
    /// Header sequence number (default: next outbound sequence).
    #[arg(long)]
    pub sequence: Option<u16>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
