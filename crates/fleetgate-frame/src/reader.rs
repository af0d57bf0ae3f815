use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{split_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads delimited frames from any `Read` stream (capture files, pipes).
///
/// Yields the escaped bytes between delimiters; pass them to
/// [`parse_packet`](crate::codec::parse_packet).
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next raw frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF; a trailing partial
    /// frame is discarded.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = split_frame(&mut self.buf, self.config.max_frame_len) {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{assemble, parse_packet};

    #[test]
    fn reads_consecutive_frames() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&assemble(0x0002, "123", 1, &[]).unwrap());
        wire.extend_from_slice(&assemble(0x0002, "123", 2, &[]).unwrap());

        let mut reader = FrameReader::new(Cursor::new(wire));
        let first = parse_packet(&reader.read_frame().unwrap()).unwrap();
        let second = parse_packet(&reader.read_frame().unwrap()).unwrap();

        assert_eq!(first.header.sequence, 1);
        assert_eq!(second.header.sequence, 2);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_read_handling() {
        let wire = assemble(0x0102, "99", 3, b"token").unwrap().to_vec();
        let reader = ByteByByteReader {
            bytes: wire,
            pos: 0,
        };

        let mut framed = FrameReader::new(reader);
        let packet = parse_packet(&framed.read_frame().unwrap()).unwrap();
        assert_eq!(packet.body.as_ref(), b"token");
    }

    #[test]
    fn iterator_stops_at_eof() {
        let mut wire = b"noise".to_vec();
        wire.extend_from_slice(&assemble(0x0002, "5", 0, &[]).unwrap());
        wire.extend_from_slice(&[0x7E, 0x01]);

        let frames: Vec<_> = FrameReader::new(Cursor::new(wire)).collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_ok());
    }

    #[test]
    fn interrupted_read_retries() {
        let wire = assemble(0x0002, "8", 0, &[]).unwrap().to_vec();
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire),
        };

        let mut framed = FrameReader::new(reader);
        assert!(framed.read_frame().is_ok());
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
