//! Channel id layout.

use std::fmt;

/// First wire channel id used by pooled stream slots.
///
/// Ids `0..STREAM_CHANNEL_START` address fixed channels by index.
pub const STREAM_CHANNEL_START: u16 = 256;

/// Largest number of stream slots the id space can address.
pub const MAX_STREAM_SLOTS: u16 = u16::MAX - STREAM_CHANNEL_START + 1;

/// A decoded wire channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Fixed message channel by index.
    Fixed(u16),
    /// Pooled stream slot.
    Stream(u16),
}

impl ChannelId {
    /// Classify a raw channel id.
    pub fn from_wire(id: u16) -> Self {
        if id < STREAM_CHANNEL_START {
            Self::Fixed(id)
        } else {
            Self::Stream(id - STREAM_CHANNEL_START)
        }
    }

    /// Raw channel id for the frame header.
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Fixed(index) => index,
            Self::Stream(slot) => STREAM_CHANNEL_START + slot,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(index) => write!(f, "fixed:{index}"),
            Self::Stream(slot) => write!(f, "stream:{slot}"),
        }
    }
}
