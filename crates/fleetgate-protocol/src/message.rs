use chrono::{DateTime, Utc};
use fleetgate_frame::message_type::*;
use fleetgate_frame::Packet;
use serde::Serialize;

use crate::error::Result;
use crate::location::{decode_location, PositionRecord};

/// Registration bodies shorter than this carry no usable vehicle info.
pub const REGISTRATION_BODY_MIN: usize = 37;

/// A decoded terminal-originated message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    /// 0x0001: the terminal's answer to a platform command.
    TerminalResponse(Option<TerminalResponse>),
    /// 0x0002
    Heartbeat,
    /// 0x0100
    Registration(RegistrationInfo),
    /// 0x0102
    Authentication { token: String },
    /// 0x0104; parameters are acknowledged but not interpreted.
    QueryParametersResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        response_sequence: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parameter_count: Option<u8>,
    },
    /// 0x0200
    Location(PositionRecord),
    /// 0x0201
    LocationQueryResponse(PositionRecord),
    /// 0x0704; acknowledged, items are not decoded.
    BatchLocation {
        #[serde(skip_serializing_if = "Option::is_none")]
        item_count: Option<u16>,
    },
    /// 0x0801
    MultimediaUpload(Option<MultimediaInfo>),
    /// 0x6006
    TextSubmit {
        #[serde(skip_serializing_if = "Option::is_none")]
        flag: Option<u8>,
        text: String,
    },
    /// Any type this gateway does not interpret.
    Unknown { message_type: u16 },
}

/// Body of a terminal general response (0x0001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminalResponse {
    /// Sequence of the platform message being answered.
    pub response_sequence: u16,
    /// Type of the platform message being answered.
    pub response_type: u16,
    /// 0 success, 1 failure, 2 malformed, 3 unsupported.
    pub result: u8,
}

/// Vehicle details sent with a registration (0x0100).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub province: u16,
    pub city: u16,
    pub manufacturer: String,
    pub model: String,
    pub terminal_id: String,
    pub plate_color: u8,
    pub plate: String,
}

/// Header of a multimedia data upload (0x0801).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MultimediaInfo {
    pub multimedia_id: u32,
    /// 0 image, 1 audio, 2 video.
    pub media_type: u8,
    /// 0 JPEG, 1 TIF, 2 MP3, 3 WAV, 4 WMV.
    pub format: u8,
    pub event_code: u8,
    pub channel_id: u8,
    /// Bytes of media payload following the 8-byte header.
    pub data_len: usize,
}

impl Message {
    /// Position carried by this message, if any.
    pub fn position(&self) -> Option<&PositionRecord> {
        match self {
            Message::Location(record) | Message::LocationQueryResponse(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_position(self) -> Option<PositionRecord> {
        match self {
            Message::Location(record) | Message::LocationQueryResponse(record) => Some(record),
            _ => None,
        }
    }

    /// Whether this type is interpreted by the gateway.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Message::Unknown { .. })
    }
}

/// Decode a parsed packet into a typed message.
///
/// `received_at` is used as the fix time when a location's BCD time is
/// unreadable. Only location bodies have a hard minimum; everything else
/// decodes leniently.
pub fn decode(packet: &Packet, received_at: DateTime<Utc>) -> Result<Message> {
    let body = packet.body.as_ref();

    let message = match packet.message_type() {
        TERMINAL_GENERAL_RESPONSE => Message::TerminalResponse(decode_terminal_response(body)),
        TERMINAL_HEARTBEAT => Message::Heartbeat,
        TERMINAL_REGISTRATION => Message::Registration(decode_registration(body)),
        TERMINAL_AUTHENTICATION => Message::Authentication {
            token: ascii_field(body),
        },
        QUERY_PARAMETERS_RESPONSE => Message::QueryParametersResponse {
            response_sequence: (body.len() >= 2).then(|| u16::from_be_bytes([body[0], body[1]])),
            parameter_count: body.get(2).copied(),
        },
        LOCATION_REPORT => Message::Location(decode_location(body, received_at)?),
        LOCATION_QUERY_RESPONSE => {
            Message::LocationQueryResponse(decode_location(body, received_at)?)
        }
        BATCH_LOCATION_REPORT => Message::BatchLocation {
            item_count: (body.len() >= 2).then(|| u16::from_be_bytes([body[0], body[1]])),
        },
        MULTIMEDIA_DATA_UPLOAD => Message::MultimediaUpload(decode_multimedia(body)),
        TEXT_INFORMATION_SUBMIT => decode_text_submit(body),
        other => Message::Unknown {
            message_type: other,
        },
    };

    Ok(message)
}

fn decode_terminal_response(body: &[u8]) -> Option<TerminalResponse> {
    (body.len() >= 5).then(|| TerminalResponse {
        response_sequence: u16::from_be_bytes([body[0], body[1]]),
        response_type: u16::from_be_bytes([body[2], body[3]]),
        result: body[4],
    })
}

/// ```text
/// ┌──────────┬─────────┬──────────┬──────────┬─────────┬────────┬─────────┐
/// │ Prov 2B  │ City 2B │ Mfr 5B   │ Model 20B│ Id 7B   │ Col 1B │ Plate.. │
/// └──────────┴─────────┴──────────┴──────────┴─────────┴────────┴─────────┘
/// ```
fn decode_registration(body: &[u8]) -> RegistrationInfo {
    if body.len() < REGISTRATION_BODY_MIN {
        return RegistrationInfo::default();
    }

    RegistrationInfo {
        province: u16::from_be_bytes([body[0], body[1]]),
        city: u16::from_be_bytes([body[2], body[3]]),
        manufacturer: ascii_field(&body[4..9]),
        model: ascii_field(&body[9..29]),
        terminal_id: ascii_field(&body[29..36]),
        plate_color: body[36],
        plate: ascii_field(&body[37..]),
    }
}

fn decode_multimedia(body: &[u8]) -> Option<MultimediaInfo> {
    (body.len() >= 8).then(|| MultimediaInfo {
        multimedia_id: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
        media_type: body[4],
        format: body[5],
        event_code: body[6],
        channel_id: body[7],
        data_len: body.len() - 8,
    })
}

fn decode_text_submit(body: &[u8]) -> Message {
    match body.split_first() {
        Some((&flag, text)) => Message::TextSubmit {
            flag: Some(flag),
            text: ascii_field(text),
        },
        None => Message::TextSubmit {
            flag: None,
            text: String::new(),
        },
    }
}

/// Fixed-width text field with NUL/space padding trimmed.
///
/// Terminals may send GBK; bytes that are not valid UTF-8 are replaced.
fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c| c == '\0' || c == ' ')
        .to_string()
}
