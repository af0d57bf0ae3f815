//! Message type identifiers.
//!
//! Terminal-originated messages live below 0x8000; platform-originated
//! replies and commands have the high bit set.

/// Terminal general response to a platform command.
pub const TERMINAL_GENERAL_RESPONSE: u16 = 0x0001;

/// Terminal heartbeat.
pub const TERMINAL_HEARTBEAT: u16 = 0x0002;

/// Terminal registration.
pub const TERMINAL_REGISTRATION: u16 = 0x0100;

/// Terminal authentication.
pub const TERMINAL_AUTHENTICATION: u16 = 0x0102;

/// Response to a parameter query.
pub const QUERY_PARAMETERS_RESPONSE: u16 = 0x0104;

/// Periodic location report.
pub const LOCATION_REPORT: u16 = 0x0200;

/// Response to a location query (same body as a location report).
pub const LOCATION_QUERY_RESPONSE: u16 = 0x0201;

/// Batch upload of buffered location reports.
pub const BATCH_LOCATION_REPORT: u16 = 0x0704;

/// Multimedia data upload.
pub const MULTIMEDIA_DATA_UPLOAD: u16 = 0x0801;

/// Text information submitted by the terminal.
pub const TEXT_INFORMATION_SUBMIT: u16 = 0x6006;

/// Platform general response (acknowledgement).
pub const PLATFORM_GENERAL_RESPONSE: u16 = 0x8001;

/// Platform registration response.
pub const PLATFORM_REGISTRATION_RESPONSE: u16 = 0x8100;

/// Set terminal parameters.
pub const SET_TERMINAL_PARAMETERS: u16 = 0x8103;

/// Query terminal parameters.
pub const QUERY_TERMINAL_PARAMETERS: u16 = 0x8104;

/// Terminal control command.
pub const TERMINAL_CONTROL: u16 = 0x8105;

/// Location information query.
pub const LOCATION_INFORMATION_QUERY: u16 = 0x8201;

/// Text information distribution.
pub const TEXT_DISTRIBUTION: u16 = 0x8300;

/// Returns a human-readable name for a message type id.
pub fn message_type_name(id: u16) -> &'static str {
    match id {
        TERMINAL_GENERAL_RESPONSE => "TERMINAL_GENERAL_RESPONSE",
        TERMINAL_HEARTBEAT => "HEARTBEAT",
        TERMINAL_REGISTRATION => "REGISTRATION",
        TERMINAL_AUTHENTICATION => "AUTHENTICATION",
        QUERY_PARAMETERS_RESPONSE => "QUERY_PARAMETERS_RESPONSE",
        LOCATION_REPORT => "LOCATION_REPORT",
        LOCATION_QUERY_RESPONSE => "LOCATION_QUERY_RESPONSE",
        BATCH_LOCATION_REPORT => "BATCH_LOCATION_REPORT",
        MULTIMEDIA_DATA_UPLOAD => "MULTIMEDIA_DATA_UPLOAD",
        TEXT_INFORMATION_SUBMIT => "TEXT_INFORMATION_SUBMIT",
        PLATFORM_GENERAL_RESPONSE => "PLATFORM_GENERAL_RESPONSE",
        PLATFORM_REGISTRATION_RESPONSE => "PLATFORM_REGISTRATION_RESPONSE",
        SET_TERMINAL_PARAMETERS => "SET_TERMINAL_PARAMETERS",
        QUERY_TERMINAL_PARAMETERS => "QUERY_TERMINAL_PARAMETERS",
        TERMINAL_CONTROL => "TERMINAL_CONTROL",
        LOCATION_INFORMATION_QUERY => "LOCATION_INFORMATION_QUERY",
        TEXT_DISTRIBUTION => "TEXT_DISTRIBUTION",
        _ => "UNKNOWN",
    }
}

/// Returns true if the id belongs to the platform-originated range.
pub fn is_platform_originated(id: u16) -> bool {
    id & 0x8000 != 0
}
