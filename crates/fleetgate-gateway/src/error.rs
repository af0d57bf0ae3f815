use std::path::PathBuf;

/// Errors that can occur in gateway operations.
///
/// Registry operations never return these; they report outcomes as `bool`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] fleetgate_transport::TransportError),

    /// Command or reply encoding failed.
    #[error("encode error: {0}")]
    Encode(#[from] fleetgate_protocol::EncodeError),

    /// Configuration file could not be loaded.
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Configuration value is out of range.
    #[error("invalid config value for {field}: {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Control-plane line framing error.
    #[error("control line error: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),

    /// The control peer hung up before replying.
    #[error("control connection closed before a response was received")]
    NoResponse,

    /// I/O error outside a transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
