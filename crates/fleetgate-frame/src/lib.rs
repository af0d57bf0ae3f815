//! Escape-coded, checksum-framed wire codec for JT/T808-style terminals.
//!
//! Every message on the wire is framed as:
//! - a `0x7E` delimiter on both ends
//! - a 12-byte header (type, attributes, BCD device id, sequence)
//! - the body and a 1-byte XOR checksum
//!
//! with `0x7E`/`0x7D` byte-stuffed between the delimiters.

pub mod bcd;
pub mod codec;
pub mod error;
pub mod escape;
pub mod header;
pub mod message_type;
pub mod reader;

#[cfg(feature = "async")]
pub mod async_codec;

pub use bcd::{device_id_from_bcd, device_id_to_bcd, parse_bcd_datetime};
pub use codec::{
    assemble, parse_packet, split_frame, FrameConfig, Packet, DEFAULT_MAX_FRAME_LEN,
    MIN_FRAME_SIZE,
};
pub use error::{FrameError, Result};
pub use escape::{checksum, escape, unescape, verify_checksum, DELIMITER, ESCAPE};
pub use header::{Header, HEADER_SIZE, MAX_BODY_LEN};
pub use message_type::message_type_name;
pub use reader::FrameReader;

#[cfg(feature = "async")]
pub use async_codec::Jt808Codec;
