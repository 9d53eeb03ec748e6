use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{BitsError, Result};
use crate::precision::string_length_bits;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Completed bytes are pushed downstream once this many are buffered.
const DRAIN_THRESHOLD: usize = 8 * 1024;

/// Packs values bit by bit onto any `Write` stream.
///
/// Whole bytes are buffered and written downstream on [`flush`](Self::flush)
/// (or when the buffer grows large). A partially filled byte stays pending
/// until more bits arrive or a flush pads it with zeros.
pub struct BitWriter<T> {
    inner: T,
    buf: BytesMut,
    current: u8,
    used: u32,
    bits_written: u64,
}

impl<T: Write> BitWriter<T> {
    /// Create a new bit writer over `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            current: 0,
            used: 0,
            bits_written: 0,
        }
    }

    /// Write the `bits` least-significant bits of `value`, most significant first.
    ///
    /// Higher bits of `value` are ignored. A width of 0 writes nothing.
    pub fn write(&mut self, value: u64, bits: u32) -> Result<()> {
        if bits > 64 {
            return Err(BitsError::WidthTooLarge(bits));
        }

        let mut remaining = bits;
        while remaining > 0 {
            let free = 8 - self.used;
            let take = remaining.min(free);
            let shift = remaining - take;
            let chunk = ((value >> shift) & ((1u64 << take) - 1)) as u8;

            self.current |= chunk << (free - take);
            self.used += take;
            remaining -= take;

            if self.used == 8 {
                self.buf.put_u8(self.current);
                self.current = 0;
                self.used = 0;
            }
        }
        self.bits_written += u64::from(bits);

        if self.buf.len() >= DRAIN_THRESHOLD {
            self.drain()?;
        }
        Ok(())
    }

    /// Write a boolean as a single bit.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write(u64::from(value), 1)
    }

    /// Write raw bytes, 8 bits each.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.used == 0 {
            self.buf.put_slice(bytes);
            self.bits_written += bytes.len() as u64 * 8;
            if self.buf.len() >= DRAIN_THRESHOLD {
                self.drain()?;
            }
            return Ok(());
        }
        for &byte in bytes {
            self.write(u64::from(byte), 8)?;
        }
        Ok(())
    }

    /// Write a string of at most `max_len` UTF-16 code units.
    ///
    /// The UTF-8 byte length goes first, in [`string_length_bits`]`(max_len)`
    /// bits, followed by the bytes themselves.
    pub fn write_string(&mut self, value: &str, max_len: usize) -> Result<()> {
        let len = value.encode_utf16().count();
        if len > max_len {
            return Err(BitsError::StringTooLong { len, max: max_len });
        }
        self.write(value.len() as u64, string_length_bits(max_len))?;
        self.write_bytes(value.as_bytes())
    }

    /// Write a character as a one-unit string.
    ///
    /// Characters outside the Basic Multilingual Plane take two UTF-16 units
    /// and are rejected.
    pub fn write_char(&mut self, value: char) -> Result<()> {
        let mut utf8 = [0u8; 4];
        self.write_string(value.encode_utf8(&mut utf8), 1)
    }

    /// Write an `f32` as its 4 little-endian IEEE-754 bytes.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Pad the pending byte with zero bits and push everything downstream.
    ///
    /// The next write starts on a fresh byte.
    pub fn flush(&mut self) -> Result<()> {
        if self.used > 0 {
            self.buf.put_u8(self.current);
            self.bits_written += u64::from(8 - self.used);
            self.current = 0;
            self.used = 0;
        }
        self.drain()?;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(BitsError::Io(err)),
            }
        }
    }

    /// Flush and return the inner stream.
    pub fn finish(mut self) -> Result<T> {
        self.flush()?;
        Ok(self.inner)
    }

    /// Total bits written so far, including flush padding.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Return the inner stream, discarding anything not yet flushed.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn drain(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(BitsError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(BitsError::Io(err)),
            }
        }
        self.buf.clear();
        Ok(())
    }
}
