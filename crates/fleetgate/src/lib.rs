//! JT/T808 device protocol gateway.
//!
//! fleetgate terminates TCP connections from GPS tracking terminals, decodes
//! their escape-coded binary frames, acknowledges every message, and routes
//! operator commands to whichever connection currently serves a device.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire framing (escaping, checksum, header, stream splitting)
//! - [`protocol`]: typed message decode, acknowledgements, command encoding
//! - [`transport`]: device transport seam and TCP/UDS sockets
//! - [`gateway`]: registry, sessions, listener and control plane (behind `gateway` feature)

/// Re-export frame types.
pub mod frame {
    pub use fleetgate_frame::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use fleetgate_protocol::*;
}

/// Re-export transport types.
pub mod transport {
    pub use fleetgate_transport::*;
}

/// Re-export gateway types (requires `gateway` feature).
#[cfg(feature = "gateway")]
pub mod gateway {
    pub use fleetgate_gateway::*;
}
