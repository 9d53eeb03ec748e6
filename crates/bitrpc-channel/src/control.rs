//! The control protocol: aborts and warnings exchanged between channel ends.
//!
//! Control messages are one-way long-form requests to the empty path with
//! interface [`CONTROL_INTERFACE_ID`]. The body is a 4-bit selector followed
//! by the fields of one message:
//!
//! ```text
//! 0 AbortRequest   outbound (1) | call id (24) | message
//! 1 AbortResponse  outbound (1) | call id (24) | message
//! 2 AbortChannel   message
//! 3 ReportWarning  message
//! ```
//!
//! `outbound` is from the sender's point of view: `true` means the call
//! originated at the sender of the control message.

use std::io::{Cursor, Read, Write};

use bitrpc_bits::{BitReader, BitWriter};
use uuid::Uuid;

use crate::error::{ChannelError, Result};
use crate::header::CALL_ID_BITS;
use crate::receiver::RequestReceiver;
use crate::request::InboundRequest;

/// Interface id of the control receiver every channel serves.
pub const CONTROL_INTERFACE_ID: Uuid = Uuid::from_u128(0x2835079a_6259_4dfa_9826_99b6acdbc02e);

pub const SELECTOR_BITS: u32 = 4;

/// Longest control message text, in UTF-16 code units. Longer text is
/// truncated when sent.
pub const MAX_MESSAGE_LEN: usize = 1024;

/// One control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    AbortRequest {
        outbound: bool,
        call_id: u32,
        message: String,
    },
    AbortResponse {
        outbound: bool,
        call_id: u32,
        message: String,
    },
    AbortChannel {
        message: String,
    },
    ReportWarning {
        message: String,
    },
}

impl ControlMessage {
    pub fn selector(&self) -> u8 {
        match self {
            Self::AbortRequest { .. } => 0,
            Self::AbortResponse { .. } => 1,
            Self::AbortChannel { .. } => 2,
            Self::ReportWarning { .. } => 3,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::AbortRequest { message, .. }
            | Self::AbortResponse { message, .. }
            | Self::AbortChannel { message }
            | Self::ReportWarning { message } => message,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        writer.write(u64::from(self.selector()), SELECTOR_BITS)?;
        match self {
            Self::AbortRequest {
                outbound, call_id, ..
            }
            | Self::AbortResponse {
                outbound, call_id, ..
            } => {
                writer.write_bool(*outbound)?;
                writer.write(u64::from(*call_id), CALL_ID_BITS)?;
            }
            Self::AbortChannel { .. } | Self::ReportWarning { .. } => {}
        }
        writer.write_string(truncate(self.message()), MAX_MESSAGE_LEN)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut BitReader<R>) -> Result<Self> {
        let selector = reader.read_u8(SELECTOR_BITS)?;
        let message = match selector {
            0 | 1 => {
                let outbound = reader.read_bool()?;
                let call_id = reader.read_u32(CALL_ID_BITS)?;
                let message = reader.read_string(MAX_MESSAGE_LEN)?;
                if selector == 0 {
                    Self::AbortRequest {
                        outbound,
                        call_id,
                        message,
                    }
                } else {
                    Self::AbortResponse {
                        outbound,
                        call_id,
                        message,
                    }
                }
            }
            2 => Self::AbortChannel {
                message: reader.read_string(MAX_MESSAGE_LEN)?,
            },
            3 => Self::ReportWarning {
                message: reader.read_string(MAX_MESSAGE_LEN)?,
            },
            other => return Err(ChannelError::UnknownControl(other)),
        };
        Ok(message)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        self.write(&mut writer)?;
        Ok(writer.finish()?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(&mut BitReader::new(Cursor::new(bytes)))
    }
}

/// Cut `message` to at most [`MAX_MESSAGE_LEN`] UTF-16 units on a character
/// boundary.
fn truncate(message: &str) -> &str {
    let mut units = 0;
    for (index, ch) in message.char_indices() {
        units += ch.len_utf16();
        if units > MAX_MESSAGE_LEN {
            return &message[..index];
        }
    }
    message
}

/// The receiver behind [`CONTROL_INTERFACE_ID`]. It decodes one message and
/// applies it to the channel the request arrived on.
#[derive(Debug, Default)]
pub struct ControlReceiver;

impl RequestReceiver for ControlReceiver {
    fn process_request(&self, mut request: InboundRequest) -> Result<()> {
        let message = ControlMessage::read(&mut BitReader::new(request.request_stream()))?;
        request.channel().apply_control(message);
        Ok(())
    }
}
