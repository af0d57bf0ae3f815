/// Errors produced while decoding a message body.
///
/// Frame-level problems never reach this layer; they are rejected by
/// `fleetgate_frame::parse_packet` first.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The body is shorter than the fixed layout of its message type.
    #[error("{kind} body too short ({len} bytes, need at least {min})")]
    BodyTooShort {
        kind: &'static str,
        len: usize,
        min: usize,
    },
}

/// Errors produced while encoding an outbound command.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Header or framing failure (bad device id, body too large).
    #[error("frame error: {0}")]
    Frame(#[from] fleetgate_frame::FrameError),

    /// A set-parameters command carries more entries than the count byte holds.
    #[error("too many parameters ({count}, max 255)")]
    TooManyParameters { count: usize },

    /// A parameter value does not fit its one-byte length field.
    #[error("parameter {id:#06x} value too long ({len} bytes, max 255)")]
    ParameterTooLong { id: u32, len: usize },

    /// A named command was not recognised.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
