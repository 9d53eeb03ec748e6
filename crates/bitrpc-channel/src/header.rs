//! Call frame headers.
//!
//! ```text
//! flags (8) | call id (24)                                       response
//! flags (8) | call id (24) | context (16) | target id (32)       short request
//! flags (8) | call id (24) | context (16) | interface (128) | path  long request
//! ```
//!
//! The header is padded to a byte boundary; the call payload follows.

use std::io::{Cursor, Read, Write};
use std::ops::BitOr;

use bitrpc_bits::{BitReader, BitWriter};
use uuid::Uuid;

use crate::error::{ChannelError, Result};

pub const CALL_ID_BITS: u32 = 24;
pub const CONTEXT_ID_BITS: u32 = 16;
pub const TARGET_ID_BITS: u32 = 32;

/// Largest call id that fits the header.
pub const MAX_CALL_ID: u32 = (1 << CALL_ID_BITS) - 1;

/// Longest target path, in UTF-16 code units.
pub const MAX_PATH_LEN: usize = 256;

/// The flags byte that opens every call frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallFlags(u8);

impl CallFlags {
    /// The frame answers an earlier request.
    pub const RESPONSE: Self = Self(1);
    /// The request expects no response, not even on error.
    pub const ONE_WAY: Self = Self(2);
    /// The request names a registered target id instead of interface and path.
    pub const SHORT_FORM: Self = Self(4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CallFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How a request names its receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// A receiver the peer registered under a numeric id.
    Short { target_id: u32 },
    /// An interface served at a path, resolved by the peer's directory.
    Long { interface_id: Uuid, path: String },
}

impl Addressing {
    pub fn long(interface_id: Uuid, path: impl Into<String>) -> Self {
        Self::Long {
            interface_id,
            path: path.into(),
        }
    }
}

/// A decoded call frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallHeader {
    Request {
        call_id: u32,
        one_way: bool,
        context_id: u16,
        target: Addressing,
    },
    Response {
        call_id: u32,
    },
}

impl CallHeader {
    pub fn call_id(&self) -> u32 {
        match self {
            Self::Request { call_id, .. } | Self::Response { call_id } => *call_id,
        }
    }

    pub fn flags(&self) -> CallFlags {
        match self {
            Self::Response { .. } => CallFlags::RESPONSE,
            Self::Request {
                one_way, target, ..
            } => {
                let mut flags = CallFlags::empty();
                if *one_way {
                    flags = flags | CallFlags::ONE_WAY;
                }
                if matches!(target, Addressing::Short { .. }) {
                    flags = flags | CallFlags::SHORT_FORM;
                }
                flags
            }
        }
    }

    /// Write the header and pad it to a byte boundary.
    pub fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        let call_id = self.call_id();
        if call_id > MAX_CALL_ID {
            return Err(ChannelError::InvalidHeader(format!(
                "call id {call_id} does not fit in {CALL_ID_BITS} bits"
            )));
        }

        writer.write(u64::from(self.flags().bits()), 8)?;
        writer.write(u64::from(call_id), CALL_ID_BITS)?;
        if let Self::Request {
            context_id, target, ..
        } = self
        {
            writer.write(u64::from(*context_id), CONTEXT_ID_BITS)?;
            match target {
                Addressing::Short { target_id } => {
                    writer.write(u64::from(*target_id), TARGET_ID_BITS)?;
                }
                Addressing::Long { interface_id, path } => {
                    check_path_len(path)?;
                    writer.write_bytes(interface_id.as_bytes())?;
                    writer.write_string(path, MAX_PATH_LEN)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a header. The reader is left at the first payload byte.
    pub fn read<R: Read>(reader: &mut BitReader<R>) -> Result<Self> {
        let flags = CallFlags::from_bits(reader.read_u8(8)?);
        let call_id = reader.read_u32(CALL_ID_BITS)?;

        let header = if flags.contains(CallFlags::RESPONSE) {
            Self::Response { call_id }
        } else {
            let context_id = reader.read_u16(CONTEXT_ID_BITS)?;
            let target = if flags.contains(CallFlags::SHORT_FORM) {
                Addressing::Short {
                    target_id: reader.read_u32(TARGET_ID_BITS)?,
                }
            } else {
                let bytes = reader.read_bytes(16)?;
                let interface_id = Uuid::from_slice(&bytes)
                    .map_err(|err| ChannelError::InvalidHeader(err.to_string()))?;
                Addressing::Long {
                    interface_id,
                    path: reader.read_string(MAX_PATH_LEN)?,
                }
            };
            Self::Request {
                call_id,
                one_way: flags.contains(CallFlags::ONE_WAY),
                context_id,
                target,
            }
        };
        reader.align();
        Ok(header)
    }

    /// Encode the header alone.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        self.write(&mut writer)?;
        Ok(writer.finish()?)
    }

    /// Decode a header from the start of `bytes`, returning it with the
    /// number of bytes it occupies.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut reader = BitReader::new(Cursor::new(bytes));
        let header = Self::read(&mut reader)?;
        let consumed = reader.into_inner().position() as usize;
        Ok((header, consumed))
    }
}

/// Check that `path` fits the long-form header.
pub fn check_path_len(path: &str) -> Result<()> {
    if path.encode_utf16().count() > MAX_PATH_LEN {
        return Err(ChannelError::InvalidPath {
            path: path.to_string(),
            reason: "longer than 256 characters",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_header_is_four_bytes() {
        let header = CallHeader::Response { call_id: 0x123456 };
        let bytes = header.encode().unwrap();
        assert_eq!(bytes, vec![0x01, 0x12, 0x34, 0x56]);
        assert_eq!(CallHeader::decode(&bytes).unwrap(), (header, 4));
    }

    #[test]
    fn short_form_layout() {
        let header = CallHeader::Request {
            call_id: 1,
            one_way: true,
            context_id: 7,
            target: Addressing::Short { target_id: 42 },
        };
        let bytes = header.encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x06, 0x00, 0x00, 0x01, 0x00, 0x07, 0x00, 0x00, 0x00, 0x2A]
        );
        assert_eq!(CallHeader::decode(&bytes).unwrap(), (header, 10));
    }

    #[test]
    fn long_form_pads_to_a_byte() {
        let interface_id = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let header = CallHeader::Request {
            call_id: 99,
            one_way: false,
            context_id: 0,
            target: Addressing::long(interface_id, "/echo"),
        };
        let mut bytes = header.encode().unwrap();
        assert_eq!(bytes[0], 0x00);
        assert_eq!(&bytes[6..22], interface_id.as_bytes());
        // 176 fixed bits + 10-bit length + 5 bytes = 226 bits
        assert_eq!(bytes.len(), 29);

        bytes.extend_from_slice(b"payload");
        let (decoded, consumed) = CallHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(&bytes[consumed..], b"payload");
    }

    #[test]
    fn flags_combine() {
        let flags = CallFlags::ONE_WAY | CallFlags::SHORT_FORM;
        assert_eq!(flags.bits(), 6);
        assert!(flags.contains(CallFlags::ONE_WAY));
        assert!(!flags.contains(CallFlags::RESPONSE));
    }

    #[test]
    fn rejects_wide_call_ids() {
        let err = CallHeader::Response { call_id: 1 << 24 }.encode().unwrap_err();
        assert!(matches!(err, ChannelError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_long_paths() {
        let header = CallHeader::Request {
            call_id: 0,
            one_way: true,
            context_id: 0,
            target: Addressing::long(Uuid::nil(), "x".repeat(257)),
        };
        assert!(matches!(
            header.encode(),
            Err(ChannelError::InvalidPath { .. })
        ));
    }

    #[test]
    fn truncated_header_is_a_bits_error() {
        let err = CallHeader::decode(&[0x04, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ChannelError::Bits(_)));
    }
}
