/// Errors that can occur during frame encoding/decoding.
///
/// Every decode-side variant is a flavour of "malformed frame": the gateway
/// drops such frames without acknowledging them.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The unescaped frame is shorter than the fixed header plus checksum.
    #[error("frame too short ({len} bytes, need at least {min})")]
    TooShort { len: usize, min: usize },

    /// The trailing XOR checksum does not match the frame contents.
    #[error("checksum mismatch (expected {expected:#04x}, found {found:#04x})")]
    ChecksumMismatch { expected: u8, found: u8 },

    /// The header declares more body bytes than the frame carries.
    #[error("declared body length {declared} exceeds available {available} bytes")]
    BodyLengthOverflow { declared: usize, available: usize },

    /// A BCD nibble outside 0-9 was found in the device id.
    #[error("invalid BCD byte {0:#04x} in device id")]
    InvalidBcd(u8),

    /// A device id could not be packed into 6 BCD bytes.
    #[error("invalid device id {0:?} (expected up to 12 decimal digits)")]
    InvalidDeviceId(String),

    /// An outbound body does not fit the 10-bit length field.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading frames from a stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before another complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that describe a bad frame rather than a bad stream.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
