use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::escape::{checksum, escape_into, unescape, verify_checksum, DELIMITER};
use crate::header::{Header, HEADER_SIZE};

/// Smallest unescaped frame: header (12) + checksum (1).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// Default limit for one escaped frame, delimiters excluded.
///
/// A 1023-byte body that is fully escaped still fits.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// A checksummed, header-parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Decoded header.
    pub header: Header,
    /// Message body (exactly `header.body_len()` bytes).
    pub body: Bytes,
}

impl Packet {
    /// Message type shortcut.
    pub fn message_type(&self) -> u16 {
        self.header.message_type
    }

    /// Device id shortcut.
    pub fn device_id(&self) -> &str {
        &self.header.device_id
    }
}

/// Parse one frame as found between the delimiters (still escaped).
///
/// Unescapes, verifies the checksum, parses the header and slices the body.
/// Bytes between the declared body and the checksum are ignored.
pub fn parse_packet(raw: &[u8]) -> Result<Packet> {
    let data = unescape(raw);
    if data.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort {
            len: data.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    if !verify_checksum(&data) {
        let (found, rest) = (data[data.len() - 1], &data[..data.len() - 1]);
        return Err(FrameError::ChecksumMismatch {
            expected: checksum(rest),
            found,
        });
    }

    let header = Header::parse(&data)?;
    let available = data.len() - MIN_FRAME_SIZE;
    let declared = header.body_len();
    if declared > available {
        return Err(FrameError::BodyLengthOverflow {
            declared,
            available,
        });
    }
    if declared < available {
        trace!(
            declared,
            available,
            "ignoring bytes between body and checksum"
        );
    }

    let body = Bytes::copy_from_slice(&data[HEADER_SIZE..HEADER_SIZE + declared]);
    Ok(Packet { header, body })
}

/// Assemble a complete outbound frame.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────┬─────────────┬───────────────┬──────┐
/// │ 0x7E │ Header (12B) │ Body (N B)  │ Checksum (1B) │ 0x7E │
/// │      │ ─────────── escaped ───────────────────── │      │
/// └──────┴──────────────┴─────────────┴───────────────┴──────┘
/// ```
pub fn assemble(message_type: u16, device_id: &str, sequence: u16, body: &[u8]) -> Result<Bytes> {
    let mut plain = BytesMut::with_capacity(MIN_FRAME_SIZE + body.len());
    Header::write(message_type, device_id, sequence, body.len(), &mut plain)?;
    plain.put_slice(body);
    let sum = checksum(&plain);
    plain.put_u8(sum);

    let mut wire = Vec::with_capacity(plain.len() + plain.len() / 8 + 2);
    wire.push(DELIMITER);
    escape_into(&plain, &mut wire);
    wire.push(DELIMITER);
    Ok(Bytes::from(wire))
}

/// Split the next delimited frame off a stream buffer.
///
/// Returns the escaped bytes between the delimiters, or `None` when more data
/// is needed. Garbage before the opening delimiter is discarded, an empty
/// `7E 7E` span resynchronises on the second delimiter, and an unterminated
/// run longer than `max_frame_len` is dropped.
pub fn split_frame(src: &mut BytesMut, max_frame_len: usize) -> Option<Bytes> {
    loop {
        let Some(start) = src.iter().position(|&b| b == DELIMITER) else {
            if !src.is_empty() {
                debug!(discarded = src.len(), "discarding bytes outside any frame");
                src.clear();
            }
            return None;
        };
        if start > 0 {
            debug!(discarded = start, "discarding bytes before frame start");
            src.advance(start);
        }

        let Some(len) = src[1..].iter().position(|&b| b == DELIMITER) else {
            if src.len() - 1 > max_frame_len {
                debug!(
                    discarded = src.len(),
                    max_frame_len, "discarding unterminated oversized frame"
                );
                src.clear();
            }
            return None;
        };

        if len == 0 {
            // Back-to-back delimiters: the second one opens the next frame.
            src.advance(1);
            continue;
        }
        if len > max_frame_len {
            debug!(len, max_frame_len, "discarding oversized frame");
            src.advance(len + 1);
            continue;
        }

        src.advance(1);
        let frame = src.split_to(len).freeze();
        src.advance(1);
        return Some(frame);
    }
}

/// Configuration for frame splitting.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum escaped frame size in bytes. Default: 4096.
    pub max_frame_len: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_timeout: None,
        }
    }
}
