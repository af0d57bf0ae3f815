//! Typed decoding, acknowledgements and command encoding for terminal
//! messages. Pure functions over [`fleetgate_frame::Packet`]; no I/O.

pub mod command;
pub mod error;
pub mod location;
pub mod message;
pub mod reply;

pub use command::{
    encode, encode_with_sequence, next_sequence, Command, GpsCommand, TerminalParameter,
};
pub use error::{DecodeError, EncodeError, Result};
pub use location::{decode_location, Extension, PositionRecord};
pub use message::{decode, Message, RegistrationInfo, TerminalResponse};
pub use reply::{general_ack, registration_ack, reply_for, DEFAULT_AUTH_TOKEN};
