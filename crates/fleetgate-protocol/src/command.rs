use std::str::FromStr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::LazyLock;

use bytes::Bytes;
use fleetgate_frame::assemble;
use fleetgate_frame::message_type::{
    LOCATION_INFORMATION_QUERY, QUERY_TERMINAL_PARAMETERS, SET_TERMINAL_PARAMETERS,
    TERMINAL_CONTROL, TEXT_DISTRIBUTION,
};
use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// Terminal control codes carried in 0x8105.
pub mod control_code {
    pub const RESET: u8 = 0x04;
    pub const RESTORE_FACTORY: u8 = 0x05;
    pub const VOICE_RECORDING_ON: u8 = 0x17;
    pub const CONTINUOUS_RECORDING_ON: u8 = 0x18;
    pub const STOP_RECORDINGS: u8 = 0x19;
    pub const CUT_FUEL: u8 = 0x64;
    pub const RESTORE_FUEL: u8 = 0x65;
    pub const FORTIFY: u8 = 0x66;
    pub const WITHDRAW: u8 = 0x67;
}

/// Terminal parameter ids for 0x8103.
pub mod parameter_id {
    /// Heartbeat interval, seconds (DWORD).
    pub const HEARTBEAT_INTERVAL: u32 = 0x0001;
    /// Primary server APN (STRING).
    pub const APN: u32 = 0x0010;
    /// Primary server address, IP or domain (STRING).
    pub const PRIMARY_SERVER: u32 = 0x0013;
    /// Backup server address (STRING).
    pub const BACKUP_SERVER: u32 = 0x0017;
    /// Server TCP port (DWORD).
    pub const TCP_PORT: u32 = 0x0018;
    /// 0 timed, 1 distance, 2 timed and distance (DWORD).
    pub const REPORTING_STRATEGY: u32 = 0x0020;
    pub const SLEEP_REPORT_INTERVAL: u32 = 0x0027;
    pub const TIME_REPORT_INTERVAL: u32 = 0x0029;
    pub const DISTANCE_REPORT_INTERVAL: u32 = 0x002C;
    /// Turning-point supplementary angle, degrees < 180 (DWORD).
    pub const TURNING_ANGLE: u32 = 0x0030;
    /// Maximum speed, km/h (DWORD).
    pub const MAX_SPEED: u32 = 0x0055;
    pub const OVERSPEED_DURATION: u32 = 0x0056;
    /// Odometer, 1/10 km (DWORD).
    pub const ODOMETER: u32 = 0x0080;
    /// Province id (WORD).
    pub const PROVINCE: u32 = 0x0081;
    /// City id (WORD).
    pub const CITY: u32 = 0x0082;
    /// Plate number (STRING).
    pub const PLATE: u32 = 0x0083;
    /// Plate color (BYTE).
    pub const PLATE_COLOR: u32 = 0x0084;
}

/// Text-distribution flag for plain display text.
pub const TEXT_FLAG_DISPLAY: u8 = 0x02;

/// A single (id, value) entry of a set-parameters command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalParameter {
    pub id: u32,
    pub value: Vec<u8>,
}

impl TerminalParameter {
    pub fn dword(id: u32, value: u32) -> Self {
        Self {
            id,
            value: value.to_be_bytes().to_vec(),
        }
    }

    pub fn word(id: u32, value: u16) -> Self {
        Self {
            id,
            value: value.to_be_bytes().to_vec(),
        }
    }

    pub fn byte(id: u32, value: u8) -> Self {
        Self {
            id,
            value: vec![value],
        }
    }

    pub fn string(id: u32, value: &str) -> Self {
        Self {
            id,
            value: value.as_bytes().to_vec(),
        }
    }
}

/// A platform-to-terminal command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 0x8105: control code plus optional text parameter.
    TerminalControl { code: u8, parameter: Option<String> },
    /// 0x8201: ask for an immediate location.
    LocationQuery,
    /// 0x8104: ask for the full parameter list.
    ParameterQuery,
    /// 0x8103
    SetParameters(Vec<TerminalParameter>),
    /// 0x8300
    TextDistribution { flags: u8, text: String },
}

impl Command {
    pub fn control(code: u8) -> Self {
        Command::TerminalControl {
            code,
            parameter: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Command::TextDistribution {
            flags: TEXT_FLAG_DISPLAY,
            text: text.into(),
        }
    }

    /// Outbound message type of this command.
    pub fn message_type(&self) -> u16 {
        match self {
            Command::TerminalControl { .. } => TERMINAL_CONTROL,
            Command::LocationQuery => LOCATION_INFORMATION_QUERY,
            Command::ParameterQuery => QUERY_TERMINAL_PARAMETERS,
            Command::SetParameters(_) => SET_TERMINAL_PARAMETERS,
            Command::TextDistribution { .. } => TEXT_DISTRIBUTION,
        }
    }

    /// Encode the message body (unframed).
    pub fn body(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Command::TerminalControl { code, parameter } => {
                let mut body = vec![*code];
                if let Some(param) = parameter.as_deref().filter(|p| !p.is_empty()) {
                    body.extend_from_slice(param.as_bytes());
                }
                Ok(body)
            }
            Command::LocationQuery | Command::ParameterQuery => Ok(Vec::new()),
            Command::SetParameters(params) => {
                let count = u8::try_from(params.len())
                    .map_err(|_| EncodeError::TooManyParameters {
                        count: params.len(),
                    })?;
                let mut body = vec![count];
                for param in params {
                    let len = u8::try_from(param.value.len()).map_err(|_| {
                        EncodeError::ParameterTooLong {
                            id: param.id,
                            len: param.value.len(),
                        }
                    })?;
                    body.extend_from_slice(&param.id.to_be_bytes());
                    body.push(len);
                    body.extend_from_slice(&param.value);
                }
                Ok(body)
            }
            Command::TextDistribution { flags, text } => {
                let mut body = vec![*flags];
                body.extend_from_slice(text.as_bytes());
                Ok(body)
            }
        }
    }
}

/// Named operator commands accepted by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpsCommand {
    CutFuel,
    RestoreFuel,
    Fortify,
    Withdraw,
    Restart,
    RestoreFactory,
    StopRecordings,
    QueryLocation,
}

impl GpsCommand {
    pub const ALL: [GpsCommand; 8] = [
        GpsCommand::CutFuel,
        GpsCommand::RestoreFuel,
        GpsCommand::Fortify,
        GpsCommand::Withdraw,
        GpsCommand::Restart,
        GpsCommand::RestoreFactory,
        GpsCommand::StopRecordings,
        GpsCommand::QueryLocation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GpsCommand::CutFuel => "cut-fuel",
            GpsCommand::RestoreFuel => "restore-fuel",
            GpsCommand::Fortify => "fortify",
            GpsCommand::Withdraw => "withdraw",
            GpsCommand::Restart => "restart",
            GpsCommand::RestoreFactory => "restore-factory",
            GpsCommand::StopRecordings => "stop-recordings",
            GpsCommand::QueryLocation => "query-location",
        }
    }

    pub fn to_command(self) -> Command {
        use control_code::*;
        match self {
            GpsCommand::CutFuel => Command::control(CUT_FUEL),
            GpsCommand::RestoreFuel => Command::control(RESTORE_FUEL),
            GpsCommand::Fortify => Command::control(FORTIFY),
            GpsCommand::Withdraw => Command::control(WITHDRAW),
            GpsCommand::Restart => Command::control(RESET),
            GpsCommand::RestoreFactory => Command::control(RESTORE_FACTORY),
            GpsCommand::StopRecordings => Command::control(STOP_RECORDINGS),
            GpsCommand::QueryLocation => Command::LocationQuery,
        }
    }
}

impl std::fmt::Display for GpsCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpsCommand {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        GpsCommand::ALL
            .into_iter()
            .find(|cmd| cmd.as_str() == wanted)
            .ok_or_else(|| EncodeError::UnknownCommand(s.to_string()))
    }
}

static SEQUENCE: LazyLock<AtomicU16> = LazyLock::new(|| {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0);
    AtomicU16::new(seed as u16)
});

/// Next outbound sequence number; wraps after 65536 commands.
pub fn next_sequence() -> u16 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Frame a command for `device_id` with the next process-wide sequence.
pub fn encode(device_id: &str, command: &Command) -> Result<Bytes, EncodeError> {
    encode_with_sequence(device_id, command, next_sequence())
}

/// Frame a command with an explicit sequence number.
pub fn encode_with_sequence(
    device_id: &str,
    command: &Command,
    sequence: u16,
) -> Result<Bytes, EncodeError> {
    let body = command.body()?;
    Ok(assemble(command.message_type(), device_id, sequence, &body)?)
}
