use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::{split_frame, DEFAULT_MAX_FRAME_LEN};

/// Stream decoder yielding the escaped bytes of each delimited frame.
///
/// Garbage and oversized runs are discarded inside [`split_frame`], so the
/// only error this decoder ever surfaces is an I/O error from the stream.
#[derive(Debug, Clone)]
pub struct Jt808Codec {
    max_frame_len: usize,
}

impl Jt808Codec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for Jt808Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Jt808Codec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        Ok(split_frame(src, self.max_frame_len))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        let frame = self.decode(src)?;
        if frame.is_none() {
            // A dangling partial frame at EOF is dropped, not reported.
            src.clear();
        }
        Ok(frame)
    }
}
