use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in device transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind a TCP listen address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to bind the control socket path.
    #[error("failed to bind to {path}: {source}")]
    BindPath {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the control socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write did not complete in time.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
