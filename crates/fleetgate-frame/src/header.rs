use bytes::{BufMut, BytesMut};

use crate::bcd::{device_id_from_bcd, device_id_to_bcd, DEVICE_ID_LEN};
use crate::error::{FrameError, Result};

/// Header: message type (2) + body attributes (2) + device id (6) + sequence (2).
pub const HEADER_SIZE: usize = 12;

/// Mask for the body-length bits of the attribute word.
pub const BODY_LEN_MASK: u16 = 0x03FF;

/// Largest body the attribute word can describe.
pub const MAX_BODY_LEN: usize = BODY_LEN_MASK as usize;

/// Decoded fixed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Message type id.
    pub message_type: u16,
    /// Raw attribute word; only the low 10 bits are interpreted.
    pub attributes: u16,
    /// Normalized device id (decimal, no leading zeros).
    pub device_id: String,
    /// Terminal-assigned sequence number.
    pub sequence: u16,
}

impl Header {
    /// Body length carried in the low 10 bits of the attribute word.
    pub fn body_len(&self) -> usize {
        usize::from(self.attributes & BODY_LEN_MASK)
    }

    /// Parse the header from the start of an unescaped frame.
    ///
    /// ```text
    /// ┌────────────┬────────────┬──────────────┬────────────┐
    /// │ Type (2B)  │ Attr (2B)  │ Device (6B)  │ Seq (2B)   │
    /// │ BE         │ BE, 10-bit │ BCD          │ BE         │
    /// │            │ body len   │              │            │
    /// └────────────┴────────────┴──────────────┴────────────┘
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(FrameError::TooShort {
                len: data.len(),
                min: HEADER_SIZE,
            });
        }

        let message_type = u16::from_be_bytes([data[0], data[1]]);
        let attributes = u16::from_be_bytes([data[2], data[3]]);
        let mut id = [0u8; DEVICE_ID_LEN];
        id.copy_from_slice(&data[4..4 + DEVICE_ID_LEN]);
        let device_id = device_id_from_bcd(&id)?;
        let sequence = u16::from_be_bytes([data[10], data[11]]);

        Ok(Self {
            message_type,
            attributes,
            device_id,
            sequence,
        })
    }

    /// Write the header for a body of `body_len` bytes.
    ///
    /// Reserved attribute bits are always written as zero.
    pub fn write(
        message_type: u16,
        device_id: &str,
        sequence: u16,
        body_len: usize,
        dst: &mut BytesMut,
    ) -> Result<()> {
        if body_len > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLarge {
                size: body_len,
                max: MAX_BODY_LEN,
            });
        }
        let id = device_id_to_bcd(device_id)?;

        dst.reserve(HEADER_SIZE);
        dst.put_u16(message_type);
        dst.put_u16(body_len as u16 & BODY_LEN_MASK);
        dst.put_slice(&id);
        dst.put_u16(sequence);
        Ok(())
    }
}
