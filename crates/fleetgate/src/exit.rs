use std::fmt;
use std::io;

use fleetgate_frame::FrameError;
use fleetgate_gateway::GatewayError;
use fleetgate_protocol::{DecodeError, EncodeError};
use fleetgate_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } => io_error(context, source),
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidDeviceId(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn encode_error(context: &str, err: EncodeError) -> CliError {
    match err {
        EncodeError::Frame(err) => frame_error(context, err),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

pub fn gateway_error(context: &str, err: GatewayError) -> CliError {
    match err {
        GatewayError::Transport(err) => transport_error(context, err),
        GatewayError::Encode(err) => encode_error(context, err),
        GatewayError::Config { .. } | GatewayError::InvalidConfig { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        GatewayError::Json(_) | GatewayError::Lines(_) | GatewayError::NoResponse => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        GatewayError::Io(source) => io_error(context, source),
    }
}
