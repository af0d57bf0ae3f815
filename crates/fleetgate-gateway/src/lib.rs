//! Device gateway runtime.
//!
//! Accepts JT/T808 device connections over TCP, acknowledges every decoded
//! message, tracks which connection currently serves each serial number, and
//! exposes a line-delimited JSON control socket for sending commands to
//! connected devices.
//!
//! ```text
//! device ──TCP──▶ GatewayListener ──▶ SessionHandler ──▶ TelemetrySink
//!                                         │
//!                                         ▼
//! operator ──UDS──▶ control ──▶ ConnectionRegistry ──▶ device
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod registry;
pub mod session;
pub mod sink;

#[cfg(unix)]
pub mod control;
#[cfg(unix)]
pub mod server;

#[cfg(test)]
mod testing;

pub use config::{default_control_socket, GatewayConfig};
pub use error::{GatewayError, Result};
pub use listener::{run_connection, ConnectionSettings, GatewayListener};
pub use registry::{ConnectionRegistry, DeviceSession, DeviceStatus, SessionInfo};
pub use session::{FrameOutcome, SessionHandler, SessionState};
pub use sink::{ChannelSink, Telemetry, TelemetrySink, TracingSink};

#[cfg(unix)]
pub use control::{handle_request, request, serve_control, ControlRequest, ControlResponse};
#[cfg(unix)]
pub use server::Gateway;
