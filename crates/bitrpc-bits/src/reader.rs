use std::io::{ErrorKind, Read};

use crate::error::{BitsError, Result};
use crate::precision::{max_utf8_bytes, string_length_bits};

/// Unpacks values bit by bit from any `Read` stream.
///
/// The reader pulls one byte at a time from `inner` and never reads ahead, so
/// after decoding a header the remaining payload can be taken back with
/// [`into_inner`](Self::into_inner) starting exactly at the next byte
/// boundary. Wrap slow streams in a `BufReader` if that matters.
pub struct BitReader<T> {
    inner: T,
    current: u8,
    remaining: u32,
}

impl<T: Read> BitReader<T> {
    /// Create a new bit reader over `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            current: 0,
            remaining: 0,
        }
    }

    /// Read a `bits`-wide unsigned value, most significant bit first.
    pub fn read(&mut self, bits: u32) -> Result<u64> {
        if bits > 64 {
            return Err(BitsError::WidthTooLarge(bits));
        }

        let mut value = 0u64;
        let mut needed = bits;
        while needed > 0 {
            if self.remaining == 0 {
                self.current = self.next_byte(needed)?;
                self.remaining = 8;
            }
            let take = needed.min(self.remaining);
            let shift = self.remaining - take;
            let chunk = (u16::from(self.current) >> shift) & ((1u16 << take) - 1);
            value = (value << take) | u64::from(chunk);
            self.remaining -= take;
            needed -= take;
        }
        Ok(value)
    }

    /// Read a single bit as a boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Read up to 64 bits.
    pub fn read_u64(&mut self, bits: u32) -> Result<u64> {
        self.read(bits)
    }

    /// Read up to 32 bits; wider requests keep only the low 32 bits.
    pub fn read_u32(&mut self, bits: u32) -> Result<u32> {
        Ok(self.read(bits)? as u32)
    }

    /// Read up to 16 bits; wider requests keep only the low 16 bits.
    pub fn read_u16(&mut self, bits: u32) -> Result<u16> {
        Ok(self.read(bits)? as u16)
    }

    /// Read up to 8 bits; wider requests keep only the low 8 bits.
    pub fn read_u8(&mut self, bits: u32) -> Result<u8> {
        Ok(self.read(bits)? as u8)
    }

    /// Read `len` raw bytes, 8 bits each.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        if self.remaining == 0 {
            let mut filled = 0usize;
            while filled < len {
                match self.inner.read(&mut bytes[filled..]) {
                    Ok(0) => {
                        return Err(BitsError::EndOfStream {
                            needed: ((len - filled) * 8) as u32,
                        })
                    }
                    Ok(n) => filled += n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(BitsError::Io(err)),
                }
            }
            return Ok(bytes);
        }
        for byte in &mut bytes {
            *byte = self.read_u8(8)?;
        }
        Ok(bytes)
    }

    /// Read a string written by [`BitWriter::write_string`](crate::BitWriter::write_string)
    /// with the same `max_len`.
    pub fn read_string(&mut self, max_len: usize) -> Result<String> {
        let max_bytes = max_utf8_bytes(max_len);
        let len = self.read(string_length_bits(max_len))?;
        if len > max_bytes {
            return Err(BitsError::InvalidStringLength {
                len,
                max: max_bytes,
            });
        }
        let value = String::from_utf8(self.read_bytes(len as usize)?)?;
        let units = value.encode_utf16().count();
        if units > max_len {
            return Err(BitsError::StringTooLong {
                len: units,
                max: max_len,
            });
        }
        Ok(value)
    }

    /// Read a character written by [`BitWriter::write_char`](crate::BitWriter::write_char).
    pub fn read_char(&mut self) -> Result<char> {
        let value = self.read_string(1)?;
        value.chars().next().ok_or(BitsError::InvalidStringLength { len: 0, max: 1 })
    }

    /// Read an `f32` from 4 little-endian IEEE-754 bytes.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Discard the unread bits of the current byte.
    pub fn align(&mut self) {
        self.remaining = 0;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Return the inner stream, positioned at the next unread byte boundary.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn next_byte(&mut self, needed: u32) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Err(BitsError::EndOfStream { needed }),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(BitsError::Io(err)),
            }
        }
    }
}
