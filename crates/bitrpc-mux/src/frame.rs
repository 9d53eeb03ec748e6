use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MuxError, Result};

/// Frame header: magic (2) + length (4) + channel (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "BR" (0x42 0x52).
pub const MAGIC: [u8; 2] = *b"BR";

/// Default maximum frame payload: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// One frame as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw wire channel id.
    pub channel: u16,
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }
}

/// Build the 8-byte header for a payload of `len` bytes.
///
/// ```text
/// ┌────────────┬────────────┬───────────┬──────────────┐
/// │ Magic (2B) │ Length     │ Channel   │ Payload      │
/// │ "BR"       │ (4B LE)    │ (2B LE)   │ (Length B)   │
/// └────────────┴────────────┴───────────┴──────────────┘
/// ```
pub fn encode_header(channel: u16, len: usize) -> Result<[u8; HEADER_SIZE]> {
    let len32 = u32::try_from(len).map_err(|_| MuxError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })?;
    let mut header = [0u8; HEADER_SIZE];
    header[..2].copy_from_slice(&MAGIC);
    header[2..6].copy_from_slice(&len32.to_le_bytes());
    header[6..].copy_from_slice(&channel.to_le_bytes());
    Ok(header)
}

/// Append a complete frame to `dst`.
pub fn encode_frame(channel: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = encode_header(channel, payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// Take one complete frame off the front of `src`.
///
/// Returns `Ok(None)` until `src` holds a whole frame.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    if src[..2] != MAGIC {
        return Err(MuxError::InvalidMagic);
    }

    let len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let channel = u16::from_le_bytes([src[6], src[7]]);
    if len > max_payload {
        return Err(MuxError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(len).freeze();
    Ok(Some(Frame { channel, payload }))
}

/// Framing limits and socket timeouts.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted frame payload in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Write timeout applied to the transport. Reads never time out because
    /// the demultiplexer blocks on them for the life of the connection.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            write_timeout: None,
        }
    }
}
