use std::io::{ErrorKind, Write};

use crate::error::{MuxError, Result};
use crate::frame::{encode_header, FrameConfig};

/// Writes whole frames to any `Write` stream.
///
/// The header and payload are written separately, so large payloads are
/// never copied into an intermediate buffer.
pub struct FrameWriter<T> {
    inner: T,
    max_payload_size: usize,
}

impl<T: Write> FrameWriter<T> {
    /// Create a frame writer with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &FrameConfig::default())
    }

    /// Create a frame writer with explicit limits.
    pub fn with_config(inner: T, config: &FrameConfig) -> Self {
        Self {
            inner,
            max_payload_size: config.max_payload_size,
        }
    }

    /// Send one frame on `channel` and flush it (blocking).
    pub fn send(&mut self, channel: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload_size {
            return Err(MuxError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }

        let header = encode_header(channel, payload.len())?;
        self.write_fully(&header)?;
        self.write_fully(payload)?;

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MuxError::Io(err)),
            }
        }
    }

    /// Largest payload [`send`](Self::send) accepts.
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn write_fully(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.inner.write(bytes) {
                Ok(0) => return Err(MuxError::ConnectionClosed),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MuxError::Io(err)),
            }
        }
        Ok(())
    }
}
