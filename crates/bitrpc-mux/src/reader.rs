use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::error::{MuxError, Result};
use crate::frame::{decode_frame, Frame, FrameConfig};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads whole frames from any `Read` stream, absorbing partial reads.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload_size: usize,
}

impl<T: Read> FrameReader<T> {
    /// Create a frame reader with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &FrameConfig::default())
    }

    /// Create a frame reader with explicit limits.
    pub fn with_config(inner: T, config: &FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_payload_size: config.max_payload_size,
        }
    }

    /// Block until the next complete frame is available.
    ///
    /// EOF at a frame boundary or inside a frame is reported as
    /// [`MuxError::ConnectionClosed`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_payload_size)? {
                return Ok(frame);
            }

            let start = self.buf.len();
            self.buf.resize(start + READ_CHUNK_SIZE, 0);
            let read = loop {
                match self.inner.read(&mut self.buf[start..]) {
                    Ok(n) => break n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        self.buf.truncate(start);
                        return Err(MuxError::Io(err));
                    }
                }
            };
            self.buf.truncate(start + read);

            if read == 0 {
                return Err(MuxError::ConnectionClosed);
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::frame::{encode_frame, encode_header};
    use crate::writer::FrameWriter;

    fn wire(frames: &[(u16, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (channel, payload) in frames {
            encode_frame(*channel, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn reads_back_to_back_frames() {
        let bytes = wire(&[(0, b"call"), (257, b"stream data"), (257, b"")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"call");
        assert_eq!(reader.read_frame().unwrap().channel, 257);
        assert!(reader.read_frame().unwrap().payload.is_empty());
        assert!(matches!(reader.read_frame(), Err(MuxError::ConnectionClosed)));
    }

    #[test]
    fn frames_larger_than_one_read_chunk() {
        let payload = vec![0x5Au8; READ_CHUNK_SIZE * 3 + 17];
        let bytes = wire(&[(3, &payload)]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().payload.len(), payload.len());
    }

    #[test]
    fn one_byte_at_a_time() {
        let bytes = wire(&[(4, b"trickle")]);
        let mut reader = FrameReader::new(Trickle { bytes, pos: 0 });
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"trickle");
    }

    #[test]
    fn eof_inside_frame() {
        let mut bytes = encode_header(2, 16).unwrap().to_vec();
        bytes.extend_from_slice(b"short");
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_frame(), Err(MuxError::ConnectionClosed)));
    }

    #[test]
    fn configured_limit_applies() {
        let bytes = wire(&[(1, &[0u8; 64])]);
        let config = FrameConfig {
            max_payload_size: 32,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), &config);
        assert!(matches!(
            reader.read_frame(),
            Err(MuxError::PayloadTooLarge { size: 64, max: 32 })
        ));
    }

    #[test]
    fn io_error_surfaces_without_losing_buffered_bytes() {
        let bytes = wire(&[(6, b"after")]);
        let mut reader = FrameReader::new(WouldBlockFirst {
            blocked: false,
            inner: Cursor::new(bytes),
        });
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, MuxError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"after");
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let sender = std::thread::spawn(move || {
            for i in 0..32u16 {
                writer.send(i, format!("frame-{i}").as_bytes()).unwrap();
            }
        });
        for i in 0..32u16 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.channel, i);
            assert_eq!(frame.payload.as_ref(), format!("frame-{i}").as_bytes());
        }
        sender.join().unwrap();
    }

    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct WouldBlockFirst {
        blocked: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for WouldBlockFirst {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.blocked {
                self.blocked = true;
                return Err(ErrorKind::WouldBlock.into());
            }
            self.inner.read(buf)
        }
    }
}
