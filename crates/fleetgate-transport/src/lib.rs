//! Device transport abstraction.
//!
//! The gateway only ever needs three things from a device connection:
//! a liveness flag, a framed write, and a best-effort close. This crate
//! defines that seam ([`DeviceTransport`]) and provides:
//! - TCP device sockets ([`TcpGatewaySocket`], [`TcpDeviceTransport`])
//! - a Unix domain socket for the local control plane ([`ControlSocket`])

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use tcp::{StreamTransport, TcpDeviceTransport, TcpGatewaySocket, DEFAULT_WRITE_TIMEOUT};
pub use traits::DeviceTransport;

#[cfg(unix)]
pub use uds::ControlSocket;
